//! Integration test support for the lattice workspace: a recording mock
//! channel, node builders and a ready-to-use activated-server harness.

pub mod common;

pub use common::builders::VariableBuilder;
pub use common::harness::TestHarness;
pub use common::mocks::MockChannel;
