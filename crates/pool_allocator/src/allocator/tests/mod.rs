//! Scenario tests for the allocator against the in-memory backend
