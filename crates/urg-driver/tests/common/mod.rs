//! 基于 TcpListener 的模拟传感器

#![allow(dead_code)]

use crossbeam_channel::{RecvTimeoutError, unbounded};
use parking_lot::Mutex;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use urg_protocol::{SensorSpec, encode_identify_block, encode_measurement_block, encode_status_block};

pub const STEPS: usize = 1081;

/// 模拟传感器的行为
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// 正常握手并持续发帧
    Streaming,
    /// 正常握手，但之后不再发送任何数据
    Stalled,
    /// 对 PP 返回无法解析的内容
    GarbageIdentify,
}

pub struct FakeSensor {
    pub addr: SocketAddr,
    commands: Arc<Mutex<Vec<String>>>,
    object_present: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

pub fn sensor_spec() -> SensorSpec {
    SensorSpec {
        model: Some("UST-10LX".to_string()),
        min_distance: Some(20),
        max_distance: Some(30000),
        ares: 1080,
        amin: Some(0),
        amax: 1080,
        afrt: Some(540),
        scan_rpm: Some(2400),
    }
}

/// 背景 3000 mm；有物体时 400..430 为 1500 mm
pub fn scan(object_present: bool) -> Vec<u32> {
    let mut ranges = vec![3000; STEPS];
    if object_present {
        ranges[400..430].fill(1500);
    }
    ranges
}

impl FakeSensor {
    pub fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let object_present = Arc::new(AtomicBool::new(false));

        let handle = {
            let commands = commands.clone();
            let object_present = object_present.clone();
            thread::spawn(move || {
                if let Ok((stream, _)) = listener.accept() {
                    serve(stream, behavior, &commands, &object_present);
                }
            })
        };

        Self {
            addr,
            commands,
            object_present,
            handle: Some(handle),
        }
    }

    pub fn set_object_present(&self, present: bool) {
        self.object_present.store(present, Ordering::Release);
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    /// 等待模拟传感器线程退出（对端断开后）
    pub fn join(mut self) -> Vec<String> {
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
        self.commands()
    }
}

fn serve(
    stream: TcpStream,
    behavior: Behavior,
    commands: &Mutex<Vec<String>>,
    object_present: &AtomicBool,
) {
    let (tx, rx) = unbounded();
    let reader = BufReader::new(stream.try_clone().unwrap());
    thread::spawn(move || {
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let mut writer = stream;
    let mut streaming: Option<String> = None;
    let mut timestamp = 0u32;
    loop {
        match rx.recv_timeout(Duration::from_millis(10)) {
            Ok(command) => {
                commands.lock().push(command.clone());
                let reply = match command.as_str() {
                    "PP" if behavior == Behavior::GarbageIdentify => "PP\n00P\nbogus\n\n".to_string(),
                    "PP" => encode_identify_block(&sensor_spec()),
                    "SCIP2.0" => "SCIP2.0\n0\n\n".to_string(),
                    "QT" => {
                        streaming = None;
                        encode_status_block("QT", "00")
                    },
                    md if md.starts_with("MD") => {
                        if behavior == Behavior::Streaming {
                            streaming = Some(md.to_string());
                        }
                        encode_status_block(md, "00")
                    },
                    other => encode_status_block(other, "0E"),
                };
                if writer.write_all(reply.as_bytes()).is_err() {
                    return;
                }
            },
            Err(RecvTimeoutError::Timeout) => {},
            Err(RecvTimeoutError::Disconnected) => return,
        }

        if let Some(echo) = &streaming {
            timestamp += 25;
            let frame = scan(object_present.load(Ordering::Acquire));
            let block = encode_measurement_block(echo, timestamp, &frame);
            if writer.write_all(block.as_bytes()).is_err() {
                return;
            }
        }
    }
}
