// Copyright (c) 2024 SIGMA ENGINE

mod scenarios;
