//! Trace de execução em arquivo, numa thread separada.
//!
//! The core only sends events over a channel, so stepping never waits on
//! file I/O. Without a sender attached the core sends nothing.

use std::io::Write;
use std::sync::mpsc;
use std::thread;

use log::error;

use super::Instruction;

/// As mensagens que o Trace Reporter pode receber.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraceEvent {
    /// An instruction retired. Address and raw word.
    Retire { pc: u32, word: u32 },
    /// An exception or interrupt was taken.
    Exception { code: u32, epc: u32, vector: u32 },
    /// Finaliza o Reporter.
    Finish,
}

fn write_event(out: &mut impl Write, event: &TraceEvent) -> std::io::Result<()> {
    match *event {
        TraceEvent::Retire { pc, word } => {
            writeln!(out, "I {:#010x} {:08x} {}", pc, word, Instruction::decode(word))
        }
        TraceEvent::Exception { code, epc, vector } => writeln!(
            out,
            "E code={} epc={:#010x} -> {:#010x}",
            code, epc, vector
        ),
        TraceEvent::Finish => out.flush(),
    }
}

/// O `TraceReporter` spawna uma thread nova que escreve os eventos no
/// arquivo.
pub struct TraceReporter;

impl TraceReporter {
    /// Cria um novo `TraceReporter`, iniciando a thread e retornando o join
    /// handle da mesma, e o write end do channel.
    pub fn new<W: Write + Send + 'static>(
        out: W,
    ) -> (thread::JoinHandle<()>, mpsc::Sender<TraceEvent>) {
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let mut out = std::io::BufWriter::new(out);
            while let Ok(event) = rx.recv() {
                if let Err(e) = write_event(&mut out, &event) {
                    error!("trace: {}", e);
                    break;
                }
                if event == TraceEvent::Finish {
                    break;
                }
            }
        });

        (handle, tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_formatted_one_per_line() {
        let mut out = Vec::new();
        write_event(&mut out, &TraceEvent::Retire { pc: 0x8000_0000, word: 0x0085_1021 }).unwrap();
        write_event(
            &mut out,
            &TraceEvent::Exception { code: 8, epc: 0x8000_0004, vector: 0x8000_0180 },
        )
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "I 0x80000000 00851021 ADDU $v0, $a0, $a1\n\
             E code=8 epc=0x80000004 -> 0x80000180\n"
        );
    }

    #[test]
    fn reporter_thread_stops_on_finish() {
        let (handle, tx) = TraceReporter::new(std::io::sink());
        tx.send(TraceEvent::Retire { pc: 0, word: 0 }).unwrap();
        tx.send(TraceEvent::Finish).unwrap();
        handle.join().unwrap();
    }
}
