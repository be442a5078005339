#![deny(missing_docs)]
//! SIP Endpoint Builder.

use std::net::SocketAddr;
use std::sync::Arc;

use itertools::Itertools;
use util::DnsResolver;

use crate::endpoint::Endpoint;
use crate::transaction::TransactionLayer;
use crate::transport::tcp::TcpStartup;
use crate::transport::udp::UdpStartup;
use crate::transport::{TransportLayer, TransportStartup};
use crate::tu::TransactionUser;

/// Builder for creating a new SIP [`Endpoint`].
pub struct EndpointBuilder {
    name: String,
    resolver: DnsResolver,
    transports: TransportLayer,
    transactions: Option<TransactionLayer>,
    tu: Option<Arc<dyn TransactionUser>>,
    transport_start: Vec<Box<dyn TransportStartup>>,
}

impl EndpointBuilder {
    /// Creates a new default instance of `EndpointBuilder`.
    pub fn new() -> Self {
        EndpointBuilder {
            name: String::new(),
            resolver: DnsResolver::default(),
            transports: TransportLayer::new(),
            transactions: None,
            tu: None,
            transport_start: vec![],
        }
    }

    /// Sets the endpoint name.
    pub fn with_name<T: AsRef<str>>(mut self, name: T) -> Self {
        self.name = name.as_ref().to_string();

        self
    }

    /// Adds a UDP listener on the specified address.
    pub fn with_udp(mut self, addr: SocketAddr) -> Self {
        self.transport_start.push(Box::new(UdpStartup::new(addr)));

        self
    }

    /// Adds a TCP listener on the specified address.
    pub fn with_tcp(mut self, addr: SocketAddr) -> Self {
        self.transport_start.push(Box::new(TcpStartup::new(addr)));

        self
    }

    /// Sets the transaction layer.
    pub fn with_transaction(mut self, transactions: TransactionLayer) -> Self {
        self.transactions = Some(transactions);

        self
    }

    /// Sets the Transaction User notified by this endpoint.
    pub fn with_transaction_user(mut self, tu: impl TransactionUser) -> Self {
        self.tu = Some(Arc::new(tu));

        self
    }

    /// Finalizes the builder into an `Endpoint`.
    pub fn build(self) -> Endpoint {
        log::trace!("Creating endpoint...");
        log::debug!(
            "Transports configured ({})",
            self.transport_start.iter().map(|t| t.kind()).join(", ")
        );

        Endpoint::from_parts(
            self.name,
            self.transports,
            self.transactions,
            self.tu,
            self.resolver,
            self.transport_start,
        )
    }
}

impl Default for EndpointBuilder {
    fn default() -> Self {
        Self::new()
    }
}
