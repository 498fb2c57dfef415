//! The command channel: the coordinator broadcasts each parsed command over
//! the world communicator, field by field; simulators rebuild it on arrival.
//! Strings travel length-prefixed, with the length always broadcast and the
//! bytes only when non-empty.

use mpi::topology::SystemCommunicator;
use mpi::traits::Communicator;
use mpi::traits::Root;

use super::CommandCode;
use super::CommandParameter;
use super::CuiCommand;
use crate::communication::COORDINATOR_RANK;

fn broadcast_string_send(world: &SystemCommunicator, value: &str) {
    let root = world.process_at_rank(COORDINATOR_RANK);
    let mut length = value.len() as i32;
    root.broadcast_into(&mut length);
    if length > 0 {
        let mut bytes = value.as_bytes().to_vec();
        root.broadcast_into(&mut bytes[..]);
    }
}

fn broadcast_string_receive(world: &SystemCommunicator) -> String {
    let root = world.process_at_rank(COORDINATOR_RANK);
    let mut length = 0i32;
    root.broadcast_into(&mut length);
    if length > 0 {
        let mut bytes = vec![0u8; length as usize];
        root.broadcast_into(&mut bytes[..]);
        String::from_utf8_lossy(&bytes).into_owned()
    } else {
        String::new()
    }
}

/// Coordinator side of the command broadcast.
pub fn send_command(world: &SystemCommunicator, command: &CuiCommand) {
    let root = world.process_at_rank(COORDINATOR_RANK);
    let mut code = command.code.code();
    root.broadcast_into(&mut code);
    broadcast_string_send(world, &command.input_line);
    broadcast_string_send(world, &command.name);
    let mut parameter_count = command.parameters.len() as i32;
    root.broadcast_into(&mut parameter_count);
    for parameter in &command.parameters {
        broadcast_string_send(world, &parameter.name);
        broadcast_string_send(world, &parameter.value);
    }
}

/// Simulator side of the command broadcast.
pub fn receive_command(world: &SystemCommunicator) -> CuiCommand {
    let root = world.process_at_rank(COORDINATOR_RANK);
    let mut code = CommandCode::None.code();
    root.broadcast_into(&mut code);
    let code = CommandCode::from_code(code).unwrap_or_else(|| {
        log::warn!("received unknown command code {code}");
        CommandCode::None
    });
    let input_line = broadcast_string_receive(world);
    let name = broadcast_string_receive(world);
    let mut command = CuiCommand::new(code, &name, &input_line);
    let mut parameter_count = 0i32;
    root.broadcast_into(&mut parameter_count);
    for _ in 0..parameter_count {
        let name = broadcast_string_receive(world);
        let value = broadcast_string_receive(world);
        command.parameters.push(CommandParameter { name, value });
    }
    command
}
