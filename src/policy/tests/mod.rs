//! Unit and property tests for the policy validator.
