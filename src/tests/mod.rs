pub mod health_tests;
pub mod provider_tests;
pub mod hwp_tests;
