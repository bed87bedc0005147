mod helpers;
mod persistence_tests;
mod record_tests;
