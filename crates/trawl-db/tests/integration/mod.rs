mod movie_tests;
mod stock_tests;
