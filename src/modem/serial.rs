use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

pub const RX_BUF_LEN: usize = 64;

/// Byte transport to the module.
pub trait SerialLink {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;
    /// Read what arrives within `timeout`. `Ok(0)` means the peer closed,
    /// `ErrorKind::TimedOut` that nothing arrived.
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
    fn discard_input(&mut self) -> io::Result<()>;
}

pub trait SerialOpener {
    fn open(&mut self, path: &str) -> io::Result<Box<dyn SerialLink>>;
}

/// Raw 8N1 serial line without flow control.
pub struct SystemSerial {
    baud_rate: u32,
}

impl SystemSerial {
    pub fn new(baud_rate: u32) -> Self {
        Self { baud_rate }
    }
}

impl SerialOpener for SystemSerial {
    fn open(&mut self, path: &str) -> io::Result<Box<dyn SerialLink>> {
        let port = serialport::new(path, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open()?;
        log::debug!("Opened {} at {} baud", path, self.baud_rate);
        Ok(Box::new(port))
    }
}

impl SerialLink for Box<dyn SerialPort> {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        Write::write_all(self, data)?;
        Write::flush(self)
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.set_timeout(timeout)?;
        Read::read(self, buf)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        Ok(self.clear(ClearBuffer::Input)?)
    }
}

/// Collect one response: wait up to `first_timeout` for the first bytes, then
/// `inter_timeout` between chunks. Stops when the line goes idle, the buffer
/// fills or the peer closes; whatever arrived is returned.
pub fn read_response(
    link: &mut dyn SerialLink,
    first_timeout: Duration,
    inter_timeout: Duration,
) -> io::Result<Vec<u8>> {
    let mut buf = [0u8; RX_BUF_LEN];
    let mut len = 0;
    let mut timeout = first_timeout;

    while len < RX_BUF_LEN {
        match link.read_timeout(&mut buf[len..], timeout) {
            Ok(0) => break,
            Ok(n) => len += n,
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                break
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
        timeout = inter_timeout;
    }

    Ok(buf[..len].to_vec())
}

#[cfg(test)]
pub mod mock {
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::{SerialLink, SerialOpener};

    pub enum Chunk {
        Data(Vec<u8>),
        Closed,
        Fail(io::ErrorKind),
    }

    #[derive(Default)]
    pub struct LinkState {
        pub opened: Vec<String>,
        pub written: Vec<String>,
        /// One entry per write; each entry is the chunks the module sends back.
        pub replies: VecDeque<Vec<Chunk>>,
        pub pending: VecDeque<Chunk>,
        pub timeouts: Vec<Duration>,
        pub discards: usize,
        pub open_error: Option<io::ErrorKind>,
        pub dropped: usize,
    }

    /// Serial line that answers each write with the next scripted reply.
    #[derive(Clone, Default)]
    pub struct ScriptedSerial {
        pub state: Arc<Mutex<LinkState>>,
    }

    impl ScriptedSerial {
        pub fn reply(&self, text: &str) -> &Self {
            self.state
                .lock()
                .unwrap()
                .replies
                .push_back(vec![Chunk::Data(text.as_bytes().to_vec())]);
            self
        }

        pub fn reply_chunks(&self, chunks: Vec<Chunk>) -> &Self {
            self.state.lock().unwrap().replies.push_back(chunks);
            self
        }

        pub fn silent(&self) -> &Self {
            self.state.lock().unwrap().replies.push_back(Vec::new());
            self
        }

        pub fn written(&self) -> Vec<String> {
            self.state.lock().unwrap().written.clone()
        }

        pub fn timeouts(&self) -> Vec<Duration> {
            self.state.lock().unwrap().timeouts.clone()
        }
    }

    struct ScriptedLink {
        state: Arc<Mutex<LinkState>>,
    }

    impl SerialOpener for ScriptedSerial {
        fn open(&mut self, path: &str) -> io::Result<Box<dyn SerialLink>> {
            let mut state = self.state.lock().unwrap();
            if let Some(kind) = state.open_error {
                return Err(io::Error::new(kind, "cannot open"));
            }
            state.opened.push(path.to_string());
            Ok(Box::new(ScriptedLink {
                state: self.state.clone(),
            }))
        }
    }

    impl SerialLink for ScriptedLink {
        fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            let mut state = self.state.lock().unwrap();
            state.written.push(String::from_utf8_lossy(data).into_owned());
            if let Some(reply) = state.replies.pop_front() {
                state.pending.extend(reply);
            }
            Ok(())
        }

        fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
            let mut state = self.state.lock().unwrap();
            state.timeouts.push(timeout);
            match state.pending.pop_front() {
                Some(Chunk::Data(mut data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        state.pending.push_front(Chunk::Data(data.split_off(n)));
                    }
                    Ok(n)
                }
                Some(Chunk::Closed) => Ok(0),
                Some(Chunk::Fail(kind)) => Err(io::Error::new(kind, "line error")),
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "timed out")),
            }
        }

        fn discard_input(&mut self) -> io::Result<()> {
            let mut state = self.state.lock().unwrap();
            state.pending.clear();
            state.discards += 1;
            Ok(())
        }
    }

    impl Drop for ScriptedLink {
        fn drop(&mut self) {
            if let Ok(mut state) = self.state.lock() {
                state.dropped += 1;
            }
        }
    }
}
