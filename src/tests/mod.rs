mod api_tests;
mod live_tests;
