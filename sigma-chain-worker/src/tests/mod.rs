// Copyright (c) 2024 SIGMA ENGINE

mod chain_tests;
mod controller_tests;
mod operation_tests;
mod tools;
