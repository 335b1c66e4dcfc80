use std::ops::{Add, Sub};

const MOD: u128 = 1 << 32;

/// 32-bit wrapping sequence number.
///
/// The actual sequence number space is finite, so all arithmetic is
/// performed modulo 2^32 (RFC 793 S3.3). A `Wrap32` is a point on that
/// cycle; together with the zero point (the ISN) and a recent checkpoint it
/// maps back to a unique 64-bit absolute sequence number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Wrap32(u32);

impl Wrap32 {
    pub const fn new(raw: u32) -> Self {
        Wrap32(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Wrap an absolute sequence number onto the cycle anchored at
    /// `zero_point`.
    pub fn wrap(n: u64, zero_point: Wrap32) -> Self {
        Wrap32(zero_point.0.wrapping_add(n as u32))
    }

    /// Invert [`Wrap32::wrap`]: of all absolute sequence numbers whose low
    /// 32 bits land on this raw value, return the one closest to
    /// `checkpoint`, ties going to the larger candidate.
    pub fn unwrap(self, zero_point: Wrap32, checkpoint: u64) -> u64 {
        let d = self.0.wrapping_sub(zero_point.0) as u64;
        if d >= checkpoint {
            return d;
        }
        // Round (checkpoint - d) to the nearest multiple of 2^32; the
        // half-way point rounds up. Widen so the bias cannot overflow.
        let k = ((checkpoint - d) as u128 + (MOD >> 1)) / MOD;
        (d as u128 + k * MOD) as u64
    }
}

impl Add<u32> for Wrap32 {
    type Output = Wrap32;

    fn add(self, rhs: u32) -> Wrap32 {
        Wrap32(self.0.wrapping_add(rhs))
    }
}

impl Sub for Wrap32 {
    type Output = u32;

    fn sub(self, rhs: Wrap32) -> u32 {
        self.0.wrapping_sub(rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_is_modular() {
        let isn = Wrap32::new(5);
        assert_eq!(Wrap32::wrap(3, isn), Wrap32::new(8));
        assert_eq!(Wrap32::wrap((1 << 32) + 3, isn), Wrap32::new(8));
        assert_eq!(Wrap32::wrap(u32::MAX as u64 + 1, Wrap32::new(7)), Wrap32::new(7));
    }

    #[test]
    fn unwrap_picks_closest_to_checkpoint() {
        // isn = 2^32 - 2, raw = 2^32 - 1, checkpoint = 2^32: the candidate
        // 2^32 + 1 is closer than 1.
        let isn = Wrap32::new(u32::MAX - 1);
        let raw = Wrap32::new(u32::MAX);
        assert_eq!(raw.unwrap(isn, 1 << 32), (1 << 32) + 1);
    }

    #[test]
    fn unwrap_below_checkpoint_rounds_up_on_tie() {
        let isn = Wrap32::new(0);
        let raw = Wrap32::new(0);
        // Candidates 0 and 2^32 are equidistant from 2^31; larger wins.
        assert_eq!(raw.unwrap(isn, 1 << 31), 1 << 32);
    }

    #[test]
    fn wrap_unwrap_round_trip() {
        let cases: &[(u64, u32, u64)] = &[
            (0, 0, 0),
            (17, 0xdead_beef, 3),
            (1 << 33, 99, (1 << 33) + 4000),
            ((1 << 40) + 12345, u32::MAX, 1 << 40),
            (u32::MAX as u64, 1, u32::MAX as u64 + 100),
        ];
        for &(abs, isn_raw, checkpoint) in cases {
            let isn = Wrap32::new(isn_raw);
            assert_eq!(
                Wrap32::wrap(abs, isn).unwrap(isn, checkpoint),
                abs,
                "abs={abs} isn={isn_raw} checkpoint={checkpoint}"
            );
        }
    }

    #[test]
    fn add_and_sub_wrap() {
        assert_eq!(Wrap32::new(u32::MAX) + 2, Wrap32::new(1));
        assert_eq!(Wrap32::new(1) - Wrap32::new(u32::MAX), 2);
        assert_eq!(Wrap32::new(10) - Wrap32::new(3), 7);
    }
}
