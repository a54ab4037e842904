use rand::{rngs::OsRng, Rng};
use time::{Duration, OffsetDateTime};

pub const OTP_LENGTH: usize = 6;

/// How long an issued code stays valid.
pub const OTP_TTL: Duration = Duration::minutes(10);

/// Six decimal digits, leading zeros kept.
pub fn generate_otp() -> String {
    let mut rng = OsRng;
    (0..OTP_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

pub fn otp_expiry(issued_at: OffsetDateTime) -> OffsetDateTime {
    issued_at + OTP_TTL
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..100 {
            let otp = generate_otp();
            assert_eq!(otp.len(), OTP_LENGTH);
            assert!(otp.chars().all(|c| c.is_ascii_digit()), "{otp}");
        }
    }

    #[test]
    fn expiry_is_ten_minutes_out() {
        let issued = datetime!(2024-05-01 12:00 UTC);
        assert_eq!(otp_expiry(issued), datetime!(2024-05-01 12:10 UTC));
    }
}
