mod attendance;
mod health_test;
mod security_test;
