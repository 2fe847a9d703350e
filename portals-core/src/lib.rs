//! portals-core: the ingestion pipeline behind the portals daemon.
//!
//! Objects dropped into a data bucket are picked up by a [`poller`], wrapped
//! in a [`item::StagedItem`] and pushed through the [`pipeline`]: download
//! into a temporary file, publish into the portal's repository under the
//! [`repository`] lock, remove the temporary file. Progress is written to the
//! portal's status bucket by the [`status`] reporter.
//!
//! Storage and publishing are reached through the traits in [`contract`], so
//! the CLI crate provides the S3 client and tests provide mocks.

pub mod config;
pub mod contract;
pub mod item;
pub mod pipeline;
pub mod poller;
pub mod portal;
pub mod publish;
pub mod repository;
pub mod status;
