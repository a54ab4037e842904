pub mod otp;
pub mod password;
