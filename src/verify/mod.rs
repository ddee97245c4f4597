pub mod checksum;
pub mod cosign;
pub mod gpg;
