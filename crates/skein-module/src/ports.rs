//! Input and output ports: how modules exchange shared-object names.
//!
//! Objects themselves live in the arena; a port carries only published
//! names. An output port fans out to every connected input port over
//! bounded channels. Port creation and wiring happen before the runner
//! starts; getting them wrong is a startup configuration error.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use indexmap::IndexMap;

use crate::config::ConfigError;

/// Messages queued per input port before the producer blocks.
const PORT_CAPACITY: usize = 256;

struct InputPort {
    sender: Sender<String>,
    receiver: Receiver<String>,
    connected: bool,
}

struct OutputPort {
    targets: Vec<Sender<String>>,
}

/// One module's named input and output ports.
pub struct PortSet {
    inputs: IndexMap<String, InputPort>,
    outputs: IndexMap<String, OutputPort>,
}

impl Default for PortSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PortSet {
    /// An empty port set.
    pub fn new() -> Self {
        Self {
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }

    /// Register an input port. Duplicate names are a startup error.
    pub fn create_input_port(&mut self, name: &str) -> Result<(), ConfigError> {
        if self.inputs.contains_key(name) || self.outputs.contains_key(name) {
            return Err(ConfigError {
                reason: format!("port '{name}' already exists"),
            });
        }
        let (sender, receiver) = bounded(PORT_CAPACITY);
        self.inputs.insert(
            name.to_string(),
            InputPort {
                sender,
                receiver,
                connected: false,
            },
        );
        Ok(())
    }

    /// Register an output port. Duplicate names are a startup error.
    pub fn create_output_port(&mut self, name: &str) -> Result<(), ConfigError> {
        if self.inputs.contains_key(name) || self.outputs.contains_key(name) {
            return Err(ConfigError {
                reason: format!("port '{name}' already exists"),
            });
        }
        self.outputs
            .insert(name.to_string(), OutputPort { targets: Vec::new() });
        Ok(())
    }

    /// Whether the named port has at least one connection.
    pub fn is_connected(&self, name: &str) -> bool {
        if let Some(input) = self.inputs.get(name) {
            return input.connected;
        }
        if let Some(output) = self.outputs.get(name) {
            return !output.targets.is_empty();
        }
        false
    }

    /// Wire `output` on the upstream set to `input` on the downstream
    /// set. An output may feed any number of inputs.
    pub fn connect(
        upstream: &mut PortSet,
        output: &str,
        downstream: &mut PortSet,
        input: &str,
    ) -> Result<(), ConfigError> {
        let target = downstream
            .inputs
            .get_mut(input)
            .ok_or_else(|| ConfigError {
                reason: format!("no input port '{input}'"),
            })?;
        let source = upstream.outputs.get_mut(output).ok_or_else(|| ConfigError {
            reason: format!("no output port '{output}'"),
        })?;
        source.targets.push(target.sender.clone());
        target.connected = true;
        Ok(())
    }

    /// Deliver an object name to every input connected to `output`.
    ///
    /// Returns how many consumers received it; `None` if no such output
    /// port exists. Delivery to a consumer whose queue is gone (its
    /// module shut down) is skipped.
    pub(crate) fn broadcast(&self, output: &str, object_name: &str) -> Option<usize> {
        let port = self.outputs.get(output)?;
        let mut delivered = 0;
        for target in &port.targets {
            if target.send(object_name.to_string()).is_ok() {
                delivered += 1;
            }
        }
        Some(delivered)
    }

    /// Take the next queued object name on `input`, waiting up to
    /// `timeout`. `Ok(None)` when nothing arrived in time; `Err` when
    /// no such input port exists.
    pub(crate) fn take_input(
        &self,
        input: &str,
        timeout: Duration,
    ) -> Result<Option<String>, ConfigError> {
        let port = self.inputs.get(input).ok_or_else(|| ConfigError {
            reason: format!("no input port '{input}'"),
        })?;
        match port.receiver.try_recv() {
            Ok(name) => Ok(Some(name)),
            Err(TryRecvError::Disconnected) => Ok(None),
            Err(TryRecvError::Empty) => match port.receiver.recv_timeout(timeout) {
                Ok(name) => Ok(Some(name)),
                Err(_) => Ok(None),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_flow_from_output_to_connected_input() {
        let mut up = PortSet::new();
        let mut down = PortSet::new();
        up.create_output_port("data_out").unwrap();
        down.create_input_port("data_in").unwrap();
        PortSet::connect(&mut up, "data_out", &mut down, "data_in").unwrap();

        assert_eq!(up.broadcast("data_out", "S00000001"), Some(1));
        let got = down
            .take_input("data_in", Duration::from_millis(10))
            .unwrap();
        assert_eq!(got.as_deref(), Some("S00000001"));
    }

    #[test]
    fn one_output_fans_out_to_many_inputs() {
        let mut up = PortSet::new();
        let mut a = PortSet::new();
        let mut b = PortSet::new();
        up.create_output_port("out").unwrap();
        a.create_input_port("in").unwrap();
        b.create_input_port("in").unwrap();
        PortSet::connect(&mut up, "out", &mut a, "in").unwrap();
        PortSet::connect(&mut up, "out", &mut b, "in").unwrap();

        assert_eq!(up.broadcast("out", "G00000002"), Some(2));
    }

    #[test]
    fn connection_state_is_visible_on_both_ends() {
        let mut up = PortSet::new();
        let mut down = PortSet::new();
        up.create_output_port("out").unwrap();
        down.create_input_port("in").unwrap();
        assert!(!up.is_connected("out"));
        assert!(!down.is_connected("in"));

        PortSet::connect(&mut up, "out", &mut down, "in").unwrap();
        assert!(up.is_connected("out"));
        assert!(down.is_connected("in"));
    }

    #[test]
    fn duplicate_port_name_is_a_startup_error() {
        let mut ports = PortSet::new();
        ports.create_input_port("p").unwrap();
        assert!(ports.create_output_port("p").is_err());
        assert!(ports.create_input_port("p").is_err());
    }

    #[test]
    fn unknown_ports_cannot_be_wired() {
        let mut up = PortSet::new();
        let mut down = PortSet::new();
        up.create_output_port("out").unwrap();
        assert!(PortSet::connect(&mut up, "out", &mut down, "in").is_err());
        assert!(PortSet::connect(&mut up, "missing", &mut down, "in").is_err());
    }

    #[test]
    fn empty_input_times_out_with_none() {
        let mut ports = PortSet::new();
        ports.create_input_port("in").unwrap();
        let got = ports.take_input("in", Duration::from_millis(5)).unwrap();
        assert_eq!(got, None);
    }
}
