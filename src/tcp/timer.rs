#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum State {
    #[default]
    Idle,
    Running,
    Expired,
}

/// Retransmission countdown driven by virtual time.
///
/// The timer is a plain value rather than a scheduled callback: the owner
/// feeds it elapsed milliseconds through [`RetransmissionTimer::tick`] and
/// polls the state afterwards. Determinism under a virtual clock falls out
/// of that.
#[derive(Clone, Copy, Debug, Default)]
pub struct RetransmissionTimer {
    remaining_ms: u64,
    state: State,
}

impl RetransmissionTimer {
    pub fn start(&mut self, timeout_ms: u64) {
        self.remaining_ms = timeout_ms;
        self.state = State::Running;
    }

    pub fn stop(&mut self) {
        self.state = State::Idle;
    }

    pub fn tick(&mut self, ms_since_last_tick: u64) {
        if self.state != State::Running {
            return;
        }
        if self.remaining_ms <= ms_since_last_tick {
            self.remaining_ms = 0;
            self.state = State::Expired;
        } else {
            self.remaining_ms -= ms_since_last_tick;
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == State::Running
    }

    pub fn is_expired(&self) -> bool {
        self.state == State::Expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_exactly_at_zero() {
        let mut timer = RetransmissionTimer::default();
        timer.start(1000);
        timer.tick(999);
        assert!(timer.is_running());
        assert!(!timer.is_expired());
        timer.tick(1);
        assert!(timer.is_expired());
        assert!(!timer.is_running());
    }

    #[test]
    fn idle_timer_ignores_ticks() {
        let mut timer = RetransmissionTimer::default();
        timer.tick(10_000);
        assert!(!timer.is_expired());
        timer.start(5);
        timer.stop();
        timer.tick(10_000);
        assert!(!timer.is_expired());
        assert!(!timer.is_running());
    }

    #[test]
    fn restart_replaces_remaining_time() {
        let mut timer = RetransmissionTimer::default();
        timer.start(100);
        timer.tick(90);
        timer.start(100);
        timer.tick(90);
        assert!(timer.is_running());
        timer.tick(10);
        assert!(timer.is_expired());
    }
}
