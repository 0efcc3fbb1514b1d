//! A bidirectional echo loop over a loopback TCP pair.
//!
//! One engine plays the device: it waits for command frames, bumps the
//! value in each and echoes it back. The other plays the host, sending a
//! handful of commands and printing the replies. Both sides run the same
//! configuration; swap the `StreamWire` for a binding over a real serial
//! handle to talk to actual hardware.

use std::net::{TcpListener, TcpStream};
use std::thread;

use bytemuck::{Pod, Zeroable};
use framewire::{Config, CrcParameters, Error, StreamWire, TransportLayer, Wire};

#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
struct Command {
    opcode: u8,
    sequence: u8,
    flags: u16,
    value: u32,
}

const ECHO_ROUNDS: u8 = 5;

fn config() -> Config {
    Config::builder_with_crc(CrcParameters::crc16_ccitt_false()).build()
}

/// Blocks until one frame is received, ignoring "nothing to parse" polls.
fn receive_blocking<W: Wire>(link: &mut TransportLayer<W>) -> Result<(), Error> {
    loop {
        match link.receive_data() {
            Ok(()) => return Ok(()),
            Err(error) if error.code() == 110 => continue,
            Err(error) => return Err(error),
        }
    }
}

fn run_device(listener: TcpListener) -> Result<(), Error> {
    let (stream, _) = listener.accept().expect("accept failed");
    stream.set_nonblocking(true).expect("nonblocking failed");
    let mut link = TransportLayer::with_config(StreamWire::new(stream), config());

    for _ in 0..ECHO_ROUNDS {
        receive_blocking(&mut link)?;

        let mut command = Command::default();
        link.read_data(&mut command, 0)?;
        command.value += 1;

        link.write_data(&command, 0)?;
        link.send_data()?;
    }
    Ok(())
}

fn main() -> Result<(), Error> {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind failed");
    let address = listener.local_addr().expect("no local address");
    let device = thread::spawn(move || run_device(listener));

    let stream = TcpStream::connect(address).expect("connect failed");
    stream.set_nonblocking(true).expect("nonblocking failed");
    let mut link = TransportLayer::with_config(StreamWire::new(stream), config());

    for sequence in 0..ECHO_ROUNDS {
        let command = Command {
            opcode: 0x10,
            sequence,
            flags: 0,
            value: sequence as u32 * 100,
        };
        link.write_data(&command, 0)?;
        link.send_data()?;

        receive_blocking(&mut link)?;
        let mut reply = Command::default();
        link.read_data(&mut reply, 0)?;
        println!(
            "sequence {}: sent value {}, device replied {}",
            reply.sequence, command.value, reply.value
        );
        assert_eq!(reply.value, command.value + 1);
    }

    device.join().expect("device thread panicked")?;
    println!("echo loop complete, final status {}", link.status());
    Ok(())
}
