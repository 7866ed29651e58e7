//! A FIFO transport for testing pipes without a USB device controller

use crate::fifo::FifoTransport;
use std::{collections::VecDeque, vec::Vec};
use usb_device::endpoint::EndpointAddress;

/// Records IN packets, and replays queued OUT packets
pub struct MockFifo {
    pub max_packet_len: usize,
    /// Packets written by IN pipes, oldest first
    pub sent: Vec<Vec<u8>>,
    /// Packets waiting for an OUT pipe to read them
    pub incoming: VecDeque<Vec<u8>>,
    pub ready: bool,
}

impl MockFifo {
    pub fn new(max_packet_len: usize) -> Self {
        MockFifo {
            max_packet_len,
            sent: Vec::new(),
            incoming: VecDeque::new(),
            ready: true,
        }
    }

    /// Queue a packet from the host
    pub fn receive(&mut self, packet: &[u8]) {
        self.incoming.push_back(packet.to_vec());
    }
}

impl FifoTransport for MockFifo {
    fn max_packet_len(&self, _: usize) -> usize {
        self.max_packet_len
    }

    fn is_ready(&self, _: EndpointAddress) -> bool {
        self.ready
    }

    fn write_packet(&mut self, _: usize, data: &[u8]) {
        assert!(data.len() <= self.max_packet_len);
        self.sent.push(data.to_vec());
    }

    fn read_packet(&mut self, _: usize, data: &mut [u8]) -> usize {
        let Some(packet) = self.incoming.pop_front() else {
            return 0;
        };
        let len = packet.len().min(data.len());
        data[..len].copy_from_slice(&packet[..len]);
        len
    }
}
