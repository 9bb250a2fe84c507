//! Process plumbing tests.
