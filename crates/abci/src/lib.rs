//! # Ostracon ABCI
//!
//! The Application BlockChain Interface: the wire messages, the client
//! transports the node uses to talk to its application, and a socket server
//! for hosting applications out of process.
//!
//! Three transports implement the same [`Client`] trait:
//! - [`LocalClient`] for in-process applications,
//! - [`SocketClient`] for the pipelined length-delimited protobuf socket,
//! - [`GrpcClient`] for gRPC applications.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ostracon_abci::{Application, Client, LocalClient};
//! use std::sync::Arc;
//!
//! struct NoopApp;
//! impl Application for NoopApp {}
//!
//! # async fn run() -> ostracon_abci::Result<()> {
//! let client = LocalClient::new(Arc::new(NoopApp));
//! let res = client.echo_sync("hello".into()).await?;
//! assert_eq!(res.message, "hello");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod application;
pub mod client;
pub mod codec;
pub mod error;
pub mod proto;
pub mod server;

pub use application::Application;
pub use client::{
    Client, GlobalCallback, GrpcClient, LocalClient, ReqRes, ResponseCallback, SocketClient,
};
pub use codec::MAX_MESSAGE_SIZE;
pub use error::{ClientError, Result};
pub use server::SocketServer;
