//! Command requests.
//!
//! A [`CommandRequest`] is a batch of device commands assembled by one
//! feature module. The caller owns it until it is handed to
//! [`CommandEngine::submit`](crate::engine::CommandEngine::submit) or
//! [`CommandEngine::discard`](crate::engine::CommandEngine::discard).

use std::fmt;

use wincs_protocol::ParamValue;

use crate::error::RequestBuildError;

/// Identifies a request through its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestHandle(pub(crate) u32);

impl RequestHandle {
    /// The raw handle value.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

/// The module that receives a request's events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dispatcher {
    /// Requests built by the application through the raw engine API.
    Application,
    DeviceInfo,
    Station,
    SoftAp,
    Assoc,
    Scan,
    Netif,
    Ota,
    Tls,
    CipherSuite,
    Dhcps,
    Provisioning,
    ExtCrypto,
    PowerSave,
}

/// One device command: an id and its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommand {
    pub cmd_id: u16,
    pub params: Vec<ParamValue>,
}

impl DeviceCommand {
    pub fn new(cmd_id: u16, params: Vec<ParamValue>) -> Self {
        DeviceCommand { cmd_id, params }
    }

    /// A configuration command of the form `CMD(param_id, value)`.
    pub fn config(cmd_id: u16, param_id: i32, value: impl Into<ParamValue>) -> Self {
        DeviceCommand::new(
            cmd_id,
            vec![ParamValue::Integer(param_id.into()), value.into()],
        )
    }

    /// A configuration command addressed to an instance: `CMD(id, param_id, value)`.
    pub fn config_at(cmd_id: u16, instance: i64, param_id: i32, value: impl Into<ParamValue>) -> Self {
        DeviceCommand::new(
            cmd_id,
            vec![
                ParamValue::Integer(instance),
                ParamValue::Integer(param_id.into()),
                value.into(),
            ],
        )
    }

    /// Bytes of variable-length data this command carries.
    pub fn extra_len(&self) -> usize {
        self.params
            .iter()
            .map(|p| match p {
                ParamValue::String(b) | ParamValue::ByteArray(b) => b.len(),
                _ => 0,
            })
            .sum()
    }
}

/// A batch of commands being assembled.
#[derive(Debug)]
pub struct CommandRequest {
    handle: RequestHandle,
    dispatcher: Dispatcher,
    context: u32,
    capacity: usize,
    extra_capacity: usize,
    extra_used: usize,
    commands: Vec<DeviceCommand>,
}

impl CommandRequest {
    pub(crate) fn new(
        handle: RequestHandle,
        capacity: usize,
        extra_capacity: usize,
        dispatcher: Dispatcher,
        context: u32,
    ) -> Self {
        CommandRequest {
            handle,
            dispatcher,
            context,
            capacity,
            extra_capacity,
            extra_used: 0,
            commands: Vec::with_capacity(capacity),
        }
    }

    pub fn handle(&self) -> RequestHandle {
        self.handle
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher
    }

    pub fn context(&self) -> u32 {
        self.context
    }

    /// Number of commands appended so far.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Command slots still free.
    pub fn remaining(&self) -> usize {
        self.capacity - self.commands.len()
    }

    /// Append a command.
    pub fn append_command(
        &mut self,
        cmd_id: u16,
        params: Vec<ParamValue>,
    ) -> Result<(), RequestBuildError> {
        self.push(DeviceCommand::new(cmd_id, params))
    }

    /// Append a prepared command.
    pub fn push(&mut self, command: DeviceCommand) -> Result<(), RequestBuildError> {
        if self.commands.len() >= self.capacity {
            return Err(RequestBuildError::CommandsFull {
                capacity: self.capacity,
            });
        }
        let needed = command.extra_len();
        let available = self.extra_capacity - self.extra_used;
        if needed > available {
            return Err(RequestBuildError::ExtraExhausted { needed, available });
        }
        self.extra_used += needed;
        self.commands.push(command);
        Ok(())
    }

    /// Commands appended so far, in order.
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub(crate) fn into_commands(self) -> Vec<DeviceCommand> {
        self.commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wincs_protocol::CMD_WSTAC;

    fn request(capacity: usize, extra: usize) -> CommandRequest {
        CommandRequest::new(RequestHandle(1), capacity, extra, Dispatcher::Application, 0)
    }

    #[test]
    fn test_append_respects_command_capacity() {
        let mut req = request(2, 0);
        req.append_command(CMD_WSTAC, vec![ParamValue::Integer(1)]).unwrap();
        req.append_command(CMD_WSTAC, vec![ParamValue::Integer(2)]).unwrap();
        assert_eq!(req.remaining(), 0);
        assert_eq!(
            req.append_command(CMD_WSTAC, vec![]),
            Err(RequestBuildError::CommandsFull { capacity: 2 })
        );
        assert_eq!(req.len(), 2);
    }

    #[test]
    fn test_append_respects_extra_capacity() {
        let mut req = request(3, 6);
        req.push(DeviceCommand::config(CMD_WSTAC, 1, "Net1")).unwrap();
        assert_eq!(
            req.push(DeviceCommand::config(CMD_WSTAC, 3, "secret")),
            Err(RequestBuildError::ExtraExhausted {
                needed: 6,
                available: 2
            })
        );
        req.push(DeviceCommand::config(CMD_WSTAC, 4, 6i64)).unwrap();
        assert_eq!(req.len(), 2);
    }

    #[test]
    fn test_config_command_shape() {
        let cmd = DeviceCommand::config_at(CMD_WSTAC, 0, 7, true);
        assert_eq!(
            cmd.params,
            vec![
                ParamValue::Integer(0),
                ParamValue::Integer(7),
                ParamValue::Bool(true)
            ]
        );
        assert_eq!(cmd.extra_len(), 0);
    }
}
