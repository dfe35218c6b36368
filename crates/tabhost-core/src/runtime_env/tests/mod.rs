pub mod catalog_tests;
