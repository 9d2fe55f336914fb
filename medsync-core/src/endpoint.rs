//! Endpoint table and failover plan.
//!
//! Holds the cloud singleton plus the discovered edge descriptors and decides
//! which endpoint a request goes to. The table only hands out copies; callers
//! never mutate a shared descriptor.

use medsync_types::{unix_millis, EndpointDescriptor};

/// Known translation endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTable {
    cloud: EndpointDescriptor,
    edges: Vec<EndpointDescriptor>,
    last_used_edge: Option<String>,
}

impl EndpointTable {
    /// Create a table with only the cloud endpoint.
    pub fn new(cloud: EndpointDescriptor) -> Self {
        Self {
            cloud,
            edges: Vec::new(),
            last_used_edge: None,
        }
    }

    /// Restore the most recently used edge address.
    pub fn with_preferred(mut self, address: Option<String>) -> Self {
        self.last_used_edge = address;
        self
    }

    /// Replace the edge set with freshly health-checked descriptors.
    ///
    /// Non-edge descriptors and duplicate addresses are dropped; the first
    /// occurrence of an address wins.
    pub fn apply_discovery(&mut self, discovered: Vec<EndpointDescriptor>) {
        let mut edges: Vec<EndpointDescriptor> = Vec::with_capacity(discovered.len());
        for descriptor in discovered.into_iter().filter(|d| d.is_edge()) {
            if !edges.iter().any(|e| e.address == descriptor.address) {
                edges.push(descriptor);
            }
        }
        self.edges = edges;
    }

    /// The endpoint a new request should try first.
    ///
    /// The most recently used healthy edge, else the first healthy edge,
    /// else the cloud.
    pub fn preferred(&self) -> EndpointDescriptor {
        let healthy = || self.edges.iter().filter(|e| e.healthy);

        if let Some(last) = &self.last_used_edge {
            if let Some(edge) = healthy().find(|e| &e.address == last) {
                return edge.clone();
            }
        }
        healthy().next().cloned().unwrap_or_else(|| self.cloud.clone())
    }

    /// Endpoints to try for one request, in order.
    ///
    /// At most one edge, followed by the cloud. Never two edges.
    pub fn attempt_plan(&self) -> Vec<EndpointDescriptor> {
        let preferred = self.preferred();
        if preferred.is_edge() {
            vec![preferred, self.cloud.clone()]
        } else {
            vec![preferred]
        }
    }

    /// Mark an edge unhealthy until the next discovery.
    ///
    /// Returns false if the id is unknown or refers to the cloud.
    pub fn mark_unhealthy(&mut self, id: &str) -> bool {
        match self.edges.iter_mut().find(|e| e.id == id) {
            Some(edge) => {
                edge.healthy = false;
                edge.last_health_check = Some(unix_millis());
                true
            }
            None => false,
        }
    }

    /// Remember a successfully used edge. Returns its address when it changed.
    pub fn record_success(&mut self, descriptor: &EndpointDescriptor) -> Option<String> {
        if !descriptor.is_edge() {
            return None;
        }
        if self.last_used_edge.as_deref() == Some(descriptor.address.as_str()) {
            return None;
        }
        self.last_used_edge = Some(descriptor.address.clone());
        self.last_used_edge.clone()
    }

    /// All known descriptors: edges first, then the cloud.
    pub fn descriptors(&self) -> Vec<EndpointDescriptor> {
        let mut all = self.edges.clone();
        all.push(self.cloud.clone());
        all
    }

    /// Discovered edges only.
    pub fn edges(&self) -> &[EndpointDescriptor] {
        &self.edges
    }

    /// The cloud descriptor.
    pub fn cloud(&self) -> &EndpointDescriptor {
        &self.cloud
    }

    /// Address of the most recently used edge, if any.
    pub fn preferred_edge_address(&self) -> Option<&str> {
        self.last_used_edge.as_deref()
    }
}
