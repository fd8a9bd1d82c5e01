//! Remote command transport and hardware control forwarding.
//!
//! The hub drives the node over SSH. [`ssh::SshClient`] is a blocking
//! client with a structured-result contract (no error ever crosses the
//! transport boundary as a panic or propagated failure), and
//! [`ssh::AsyncSshClient`] adapts it for async callers while serializing
//! calls per transport instance.
//!
//! [`node::NodeClient`] sits on top and translates hardware and
//! experiment calls into either remote `curl` probes against the node's
//! local API or direct HTTP calls when co-located, normalizing every
//! outcome into one tagged [`node::NodeResponse`].

pub mod node;
pub mod ssh;
