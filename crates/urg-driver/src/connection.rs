//! 传感器会话
//!
//! 提供对外的 `Connection` 结构体：负责握手、启动后台采集线程、
//! 发布聚类结果，以及按顺序关闭会话。

use crate::config::{DetectionConfig, SessionConfig};
use crate::error::DriverError;
use crate::heartbeat::ConnectionMonitor;
use crate::metrics::{AcquisitionMetrics, MetricsSnapshot};
use crate::pipeline::{AcquisitionContext, CancelToken, JoinFailure, JoinWatch, acquisition_loop};
use crate::state::{AtomicSessionState, SessionState};
use crate::store::{ScanSnapshot, ScanStore};
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use urg_detect::{
    ClusterEngine, ClusterSet, DetectionParams, ObjectCluster, Point2, Pose, ScanProjector,
};
use urg_protocol::{
    ResponseBlock, ScipCommand, SensorSpec, VersionInfo, decode_identify_response,
    decode_version_response, measurement::STATUS_DATA,
};
use urg_transport::{AbortHandle, ScipTransport, TcpTransport};

type BoxedTransport = Box<dyn ScipTransport>;

/// 握手时最多跳过的无关响应块（上一会话残留的数据帧）
const MAX_STALE_BLOCKS: usize = 32;

/// 数据流存活判定时限
const LIVENESS_TIMEOUT: Duration = Duration::from_millis(500);

struct Worker {
    handle: JoinHandle<BoxedTransport>,
    cancel: CancelToken,
    abort: Option<AbortHandle>,
}

/// 一次打开的会话所持有的资源
struct Session {
    spec: SensorSpec,
    /// 截断后的测量窗口（含两端）
    window: (usize, usize),
    store: Arc<ScanStore>,
    stream_lost: Arc<AtomicBool>,
    worker: Option<Worker>,
}

/// 传感器会话
///
/// # 线程模型
///
/// - 后台采集线程：`latest` 的唯一写者
/// - 调用方线程：打开/关闭会话、修改检测参数与位姿、捕获基准、执行聚类
///
/// # 示例
///
/// ```no_run
/// use urg_driver::{Connection, SessionConfig};
/// use std::time::Duration;
///
/// let mut urg = Connection::new(SessionConfig::default());
/// if urg.open("192.168.0.10", 0, 1080) {
///     urg.wait_for_first_frame(Duration::from_secs(1));
///     urg.capture_baseline();
///     let clusters = urg.update();
///     println!("{} objects", clusters.len());
///     urg.close();
/// }
/// ```
pub struct Connection {
    config: SessionConfig,
    state: Arc<AtomicSessionState>,
    session: Option<Session>,
    detection: DetectionConfig,
    pose: ArcSwap<Pose>,
    clusters: ArcSwap<ClusterSet>,
    metrics: Arc<AcquisitionMetrics>,
    monitor: Arc<ConnectionMonitor>,
}

impl Connection {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: Arc::new(AtomicSessionState::default()),
            session: None,
            detection: DetectionConfig::default(),
            pose: ArcSwap::from_pointee(Pose::identity()),
            clusters: ArcSwap::from_pointee(ClusterSet::default()),
            metrics: Arc::new(AcquisitionMetrics::new()),
            monitor: Arc::new(ConnectionMonitor::new(LIVENESS_TIMEOUT)),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ==================== 生命周期 ====================

    /// 打开会话
    ///
    /// 连接或握手失败时记录日志并返回 `false`，不会 panic。
    /// 需要具体错误时使用 [`try_open`](Self::try_open)。
    pub fn open(&mut self, address: &str, start_step: u16, end_step: u16) -> bool {
        self.config.address = address.to_string();
        self.config.start_step = start_step;
        self.config.end_step = end_step;
        match self.try_open() {
            Ok(()) => true,
            Err(e) => {
                if e.is_connect_failure() {
                    warn!("Failed to connect to {}: {}", address, e);
                } else {
                    error!("Failed to open session with {}: {}", address, e);
                }
                false
            },
        }
    }

    /// 按当前配置连接并握手
    pub fn try_open(&mut self) -> Result<(), DriverError> {
        self.release_lost_session()?;
        self.state.set(SessionState::Connecting);
        let connect_timeout = self.config.connect_timeout;
        let transport = self.config.socket_addr().and_then(|addr| {
            TcpTransport::connect(addr, connect_timeout).map_err(DriverError::from)
        });
        match transport {
            Ok(transport) => {
                info!("Connected to {}", transport.peer_addr());
                self.open_with(transport)
            },
            Err(e) => {
                self.state.set(SessionState::Disconnected);
                Err(e)
            },
        }
    }

    /// 在已建立的传输上握手并启动采集
    pub fn open_with<T: ScipTransport + 'static>(&mut self, transport: T) -> Result<(), DriverError> {
        self.release_lost_session()?;
        self.state.set(SessionState::Handshaking);
        match self.start_session(Box::new(transport)) {
            Ok(session) => {
                info!(
                    "Streaming steps {}..={} ({} steps/rev, amax {})",
                    session.window.0, session.window.1, session.spec.ares, session.spec.amax
                );
                self.session = Some(session);
                Ok(())
            },
            Err(e) => {
                self.state.set(SessionState::Disconnected);
                Err(e)
            },
        }
    }

    /// 数据流已中断的会话先关闭，仍在采集的会话返回 `AlreadyOpen`
    fn release_lost_session(&mut self) -> Result<(), DriverError> {
        let lost = match &self.session {
            Some(session) => session.stream_lost.load(Ordering::Acquire),
            None => return Ok(()),
        };
        if !lost {
            return Err(DriverError::AlreadyOpen);
        }
        info!("Releasing session with lost stream before reopening");
        self.close();
        Ok(())
    }

    fn start_session(&self, mut transport: BoxedTransport) -> Result<Session, DriverError> {
        transport.set_read_timeout(self.config.handshake_timeout)?;

        let reply = request(&mut transport, ScipCommand::Identify)?;
        let spec = decode_identify_response(&reply)?;
        debug!("Sensor spec: {:?}", spec);

        // 模式切换的应答只是回显，内容不检查
        request(&mut transport, ScipCommand::SwitchToScip2)?;

        let amax = u16::try_from(spec.amax).unwrap_or(u16::MAX);
        let end_step = self.config.end_step.min(amax);
        let start_step = self.config.start_step.min(end_step);
        let command = ScipCommand::continuous_measurement(start_step, end_step)?;
        let reply = request(&mut transport, command)?;
        ResponseBlock::parse(&reply)?.expect_status(&["00"])?;

        transport.set_read_timeout(self.config.read_timeout)?;

        let window = (start_step as usize, end_step as usize);
        let store = Arc::new(ScanStore::new(spec.steps()));
        let stream_lost = Arc::new(AtomicBool::new(false));
        self.metrics.reset();
        self.monitor.reset();

        let ctx = AcquisitionContext {
            store: store.clone(),
            metrics: self.metrics.clone(),
            monitor: self.monitor.clone(),
            offset: window.0,
            window_len: window.1 - window.0 + 1,
            stream_lost: stream_lost.clone(),
            state: self.state.clone(),
        };
        let cancel = CancelToken::new();
        let abort = transport.abort_handle();
        // 采集线程断流时会改写状态，必须在线程启动前进入 Streaming
        self.state.set(SessionState::Streaming);
        let handle = {
            let cancel = cancel.clone();
            thread::Builder::new()
                .name("urg-acquisition".to_string())
                .spawn(move || acquisition_loop(transport, ctx, cancel))
                .map_err(|e| DriverError::IoThread(e.to_string()))?
        };

        Ok(Session {
            spec,
            window,
            store,
            stream_lost,
            worker: Some(Worker {
                handle,
                cancel,
                abort,
            }),
        })
    }

    /// 关闭会话（阻塞，可重复调用）
    ///
    /// 先停止采集线程并等待其退出，再发送停止命令、读取回显、断开连接。
    /// 线程在 `join_timeout` 内未退出时强制中断读取，并跳过停止命令；
    /// 数据流已中断时同样跳过停止命令。
    pub fn close(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        self.state.set(SessionState::Closing);

        if let Some(worker) = session.worker.take() {
            worker.cancel.cancel();
            let transport = self.join_worker(worker);
            if let Some(mut transport) = transport {
                if session.stream_lost.load(Ordering::Acquire) {
                    debug!("Stream already lost, skipping stop command");
                } else {
                    self.stop_measurement(&mut transport);
                }
            }
        }

        self.clusters.store(Arc::new(ClusterSet::default()));
        self.monitor.reset();
        self.state.set(SessionState::Disconnected);
        info!("Session closed");
    }

    fn join_worker(&self, worker: Worker) -> Option<BoxedTransport> {
        let timeout = self.config.join_timeout;
        let watch = JoinWatch::new(worker.handle);
        match watch.wait(timeout) {
            Ok(transport) => Some(transport),
            Err(JoinFailure::TimedOut) => {
                warn!(
                    "Acquisition thread still blocked after {:?}, aborting read",
                    timeout
                );
                if let Some(abort) = worker.abort {
                    abort.abort();
                }
                if let Err(e) = watch.wait(timeout) {
                    error!("Acquisition thread failed to shut down: {:?}", e);
                }
                None
            },
            Err(JoinFailure::Panicked) => {
                error!("Acquisition thread panicked");
                None
            },
        }
    }

    fn stop_measurement(&self, transport: &mut BoxedTransport) {
        let timeout = self.config.close_timeout;
        if let Err(e) = transport.set_read_timeout(Some(timeout)) {
            warn!("Failed to set close timeout: {}", e);
        }
        if let Err(e) = transport.send(&ScipCommand::StopMeasurement.encode()) {
            warn!("Failed to send stop command: {}", e);
            return;
        }
        // 丢弃在途的数据帧，直到收到 QT 回显
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            match transport.receive_block() {
                Ok(block) if echo_of(&block).starts_with("QT") => {
                    debug!("Stop command acknowledged");
                    return;
                },
                Ok(_) => continue,
                Err(e) => {
                    debug!("No stop acknowledgement: {}", e);
                    return;
                },
            }
        }
        debug!("Stop acknowledgement not received within {:?}", timeout);
    }

    /// 会话是否可用（已握手且数据流未中断）
    pub fn is_open(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.stream_lost.load(Ordering::Acquire))
            && self.state.get().is_streaming()
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// 握手获得的传感器参数
    pub fn sensor_spec(&self) -> Option<&SensorSpec> {
        self.session.as_ref().map(|s| &s.spec)
    }

    /// 截断后的测量窗口（含两端）
    pub fn window(&self) -> Option<(usize, usize)> {
        self.session.as_ref().map(|s| s.window)
    }

    /// 阻塞等待第一帧数据，超时或未打开时返回 `false`
    pub fn wait_for_first_frame(&self, timeout: Duration) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.store.wait_for_frame(0, timeout))
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 最近 500 ms 内是否收到过有效帧
    pub fn is_receiving(&self) -> bool {
        self.monitor.is_receiving()
    }

    pub fn time_since_last_frame(&self) -> Option<Duration> {
        self.monitor.time_since_last_frame()
    }

    // ==================== 检测参数与位姿 ====================

    /// 设置阈值与尺寸范围，返回是否全部接受
    pub fn set_detection_params(&self, gap: i32, min_size: i32, max_size: i32) -> bool {
        self.detection.set_params(gap, min_size, max_size)
    }

    pub fn detection_params(&self) -> DetectionParams {
        self.detection.snapshot()
    }

    pub fn skip(&self) -> usize {
        self.detection.skip()
    }

    /// 设置采样步长（小于 1 时按 1 处理）
    pub fn set_skip(&self, skip: i32) -> usize {
        self.detection.set_skip(skip)
    }

    pub fn set_pose(&self, pose: Pose) {
        self.pose.store(Arc::new(pose));
    }

    pub fn pose(&self) -> Pose {
        **self.pose.load()
    }

    // ==================== 扫描数据 ====================

    /// 每帧步数（`amax + 1`），未打开时为 0
    pub fn steps(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.spec.steps())
    }

    pub fn latest(&self) -> Vec<u32> {
        self.session
            .as_ref()
            .map_or_else(Vec::new, |s| s.store.latest())
    }

    pub fn baseline(&self) -> Vec<u32> {
        self.session
            .as_ref()
            .map_or_else(Vec::new, |s| s.store.baseline())
    }

    /// 差分帧 `|latest - baseline|`
    pub fn calibrated(&self) -> Vec<u32> {
        self.session
            .as_ref()
            .map_or_else(Vec::new, |s| s.store.calibrated())
    }

    pub fn snapshot(&self) -> Option<ScanSnapshot> {
        self.session.as_ref().map(|s| s.store.snapshot())
    }

    /// 以当前帧作为基准帧；未打开时返回 `false`
    pub fn capture_baseline(&self) -> bool {
        match &self.session {
            Some(session) => {
                session.store.capture_baseline();
                info!("Baseline captured");
                true
            },
            None => false,
        }
    }

    // ==================== 投影 ====================

    fn projector(&self) -> Option<ScanProjector> {
        self.session
            .as_ref()
            .map(|s| ScanProjector::new(s.spec.ares, self.pose()))
    }

    /// 实时帧的局部坐标
    pub fn calc_raw_pos(&self, step: usize) -> Option<Point2<f64>> {
        self.projector()?.raw_local(&self.latest(), step)
    }

    /// 差分帧的局部坐标
    pub fn calc_calibrated_pos(&self, step: usize) -> Option<Point2<f64>> {
        let snapshot = self.snapshot()?;
        self.projector()?
            .calibrated_local(&snapshot.latest, &snapshot.baseline, step)
    }

    /// 基准帧的局部坐标
    pub fn calc_baseline_pos(&self, step: usize) -> Option<Point2<f64>> {
        self.projector()?.baseline_local(&self.baseline(), step)
    }

    /// 实时帧的世界坐标
    pub fn calc_pos(&self, step: usize) -> Option<Point2<f64>> {
        self.projector()?.raw_world(&self.latest(), step)
    }

    /// 基准帧的世界坐标
    pub fn calc_baseline_world_pos(&self, step: usize) -> Option<Point2<f64>> {
        self.projector()?.baseline_world(&self.baseline(), step)
    }

    // ==================== 聚类 ====================

    /// 在一致快照上执行聚类并发布结果
    pub fn update(&self) -> Arc<ClusterSet> {
        let set = match (&self.session, self.projector()) {
            (Some(session), Some(projector)) => {
                let snapshot = session.store.snapshot();
                let params = self.detection.snapshot();
                ClusterEngine::new(projector).detect(&snapshot.latest, &snapshot.baseline, &params)
            },
            _ => ClusterSet::default(),
        };
        let set = Arc::new(set);
        self.clusters.store(set.clone());
        set
    }

    /// 最近一次 `update()` 发布的结果
    pub fn objects(&self) -> Arc<ClusterSet> {
        self.clusters.load_full()
    }

    pub fn largest_object(&self) -> Option<ObjectCluster> {
        self.clusters.load().largest().copied()
    }

    pub fn sorted_objects(&self) -> Vec<ObjectCluster> {
        self.clusters.load().sorted_by_size()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// 读取传感器版本信息（`VV`）
///
/// 在尚未开始测距的传输上使用，例如 [`read_version`] 建立的临时连接。
pub fn query_version<T: ScipTransport>(transport: &mut T) -> Result<VersionInfo, DriverError> {
    let reply = request(transport, ScipCommand::Version)?;
    Ok(decode_version_response(&reply)?)
}

/// 单独建立一次连接读取版本信息，不启动测距
pub fn read_version(config: &SessionConfig) -> Result<VersionInfo, DriverError> {
    let addr = config.socket_addr()?;
    let mut transport = TcpTransport::connect(addr, config.connect_timeout)?;
    transport.set_read_timeout(config.handshake_timeout)?;
    query_version(&mut transport)
}

/// 发送命令并等待带相同回显的应答
///
/// 跳过上一会话残留的数据帧（状态 `99`），最多 `MAX_STALE_BLOCKS` 个。
fn request<T: ScipTransport>(transport: &mut T, command: ScipCommand) -> Result<String, DriverError> {
    let mut block = transport.request(&command.encode())?;
    let mut skipped = 0;
    while !is_reply_to(&block, command) {
        if skipped == MAX_STALE_BLOCKS {
            return Err(DriverError::NoReply {
                command: command.to_string(),
                skipped,
            });
        }
        skipped += 1;
        debug!("Skipping unrelated block #{} while waiting for {}", skipped, command);
        block = transport.receive_block()?;
    }
    Ok(block)
}

fn is_reply_to(block: &str, command: ScipCommand) -> bool {
    match ResponseBlock::parse(block) {
        Ok(parsed) => parsed.echo.starts_with(command.echo_prefix()) && parsed.status != STATUS_DATA,
        Err(_) => false,
    }
}

fn echo_of(block: &str) -> &str {
    block.lines().find(|l| !l.is_empty()).unwrap_or("")
}
