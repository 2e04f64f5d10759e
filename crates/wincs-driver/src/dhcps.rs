//! DHCP server.

use std::net::Ipv4Addr;

use tracing::{debug, warn};
use wincs_protocol::{
    MacAddr, ParamValue, CMD_DHCPSC, DHCPSC_ENABLED, DHCPSC_GATEWAY, DHCPSC_NETIF_IDX,
    DHCPSC_POOL_START,
};

use crate::driver::Driver;
use crate::error::{DriverError, Result};
use crate::event::{RequestEvent, RequestEventKind};
use crate::observer::DhcpsObserver;
use crate::request::{DeviceCommand, Dispatcher};
use crate::transport::Transport;

/// DHCP server notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhcpsEvent {
    /// A soft AP peer was given an address.
    LeaseAssigned { mac: MacAddr, ip: Ipv4Addr },
}

impl<T: Transport> Driver<T> {
    /// Enable or disable an address pool. Leases are reported to `observer`.
    pub fn dhcps_enable_set(
        &mut self,
        pool: u8,
        enabled: bool,
        observer: Option<Box<dyn DhcpsObserver>>,
    ) -> Result<()> {
        self.dhcps_send(pool, DHCPSC_ENABLED, enabled.into())?;
        debug!("Dhcps: pool {} enabled={}", pool, enabled);
        self.observers.dhcps = observer;
        Ok(())
    }

    /// First address handed out by a pool.
    pub fn dhcps_pool_address_set(&mut self, pool: u8, start: Ipv4Addr) -> Result<()> {
        self.dhcps_send(pool, DHCPSC_POOL_START, start.into())
    }

    /// Gateway advertised to clients.
    pub fn dhcps_gateway_set(&mut self, pool: u8, gateway: Ipv4Addr) -> Result<()> {
        self.dhcps_send(pool, DHCPSC_GATEWAY, gateway.into())
    }

    /// Bind a pool to a network interface.
    pub fn dhcps_netif_bind(&mut self, pool: u8, if_idx: u8) -> Result<()> {
        if if_idx >= self.config.num_netifs {
            return Err(DriverError::InvalidArg);
        }
        self.dhcps_send(pool, DHCPSC_NETIF_IDX, ParamValue::Integer(if_idx.into()))
    }

    fn dhcps_send(&mut self, pool: u8, param_id: i32, value: ParamValue) -> Result<()> {
        self.ensure_open()?;
        self.send_request(
            Dispatcher::Dhcps,
            u32::from(pool),
            vec![DeviceCommand::config_at(CMD_DHCPSC, pool.into(), param_id, value)],
        )?;
        Ok(())
    }

    pub(crate) fn dhcps_request_event(&mut self, event: &RequestEvent) {
        if let RequestEventKind::CmdStatus { status, .. } = &event.kind {
            if !status.is_ok() {
                warn!("Dhcps: pool {} update failed: {}", event.context, status);
            }
        }
    }
}
