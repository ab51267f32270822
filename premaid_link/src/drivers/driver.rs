use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::sleep;

use crate::packets::{hex, Command, ReplyFrame};
use crate::joint::JointSet;
use crate::parser::FrameParser;
use crate::servo::JointMask;
use crate::transport::{BurstMonitor, BurstState, OutboundFrame, SendCycle};
use crate::LinkError;

use super::DriverConfig;

#[derive(Debug)]
enum DriverMessage {
    Frame(OutboundFrame),
    Close,
}

/// State shared by the driver handles and its two I/O tasks.
#[derive(Debug)]
struct LinkState {
    log_channel: broadcast::Sender<String>,
    reply_channel: broadcast::Sender<ReplyFrame>,
    burst: BurstMonitor,
    connected: AtomicBool,
    closing: AtomicBool,
}

impl LinkState {
    fn log_message<T: Into<String>>(&self, message: T) {
        let message = message.into();
        #[cfg(feature = "logging")]
        tracing::info!("{}", message);
        let _ = self.log_channel.send(message);
    }
}

/// Handle to a robot link.
///
/// Commands are queued without blocking and written by a background task
/// once per cycle; replies are parsed by a second task and broadcast to
/// subscribers. Clones share the same link.
#[derive(Debug, Clone)]
pub struct PremaidDriver {
    pub config: DriverConfig,
    pub log_channel: broadcast::Sender<String>,
    queue_tx: mpsc::UnboundedSender<DriverMessage>,
    link: Arc<LinkState>,
    writer_done: watch::Receiver<bool>,
}

impl PremaidDriver {
    /// Connects to a TCP endpoint that bridges the robot's serial port,
    /// retrying `config.connect_retries` times.
    ///
    /// This is the only call of the driver that reports failure. Once
    /// connected, sends on a dead link are silent no-ops.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let driver = PremaidDriver::connect(DriverConfig::default()).await?;
    /// driver.request_battery();
    /// driver.close_and_wait().await;
    /// ```
    pub async fn connect(config: DriverConfig) -> Result<PremaidDriver, LinkError> {
        config.validate().map_err(LinkError::InvalidConfig)?;
        let stream = connect_with_retries(
            &config.connection_url(),
            config.connect_retries,
            Duration::from_millis(config.retry_delay_ms),
        )
        .await?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("could not disable Nagle: {}", e);
        }
        Ok(Self::attach(stream, config))
    }

    /// Runs the driver over an already open byte stream. Must be called
    /// from within a tokio runtime.
    pub fn attach<S>(stream: S, config: DriverConfig) -> PremaidDriver
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = split(stream);
        let (log_channel, _) = broadcast::channel(100);
        let (reply_channel, _) = broadcast::channel(100);
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (done_tx, writer_done) = watch::channel(false);

        let link = Arc::new(LinkState {
            log_channel: log_channel.clone(),
            reply_channel,
            burst: BurstMonitor::new(),
            connected: AtomicBool::new(true),
            closing: AtomicBool::new(false),
        });

        let period = Duration::from_millis(config.cycle_period_ms.max(1));
        let writer_link = link.clone();
        tokio::spawn(async move {
            if let Err(e) = send_queue_to_robot(&writer_link, write_half, queue_rx, period).await {
                writer_link.log_message(format!("send queue failed: {}", e));
            }
            writer_link.connected.store(false, Ordering::Release);
            let _ = done_tx.send(true);
        });

        let reader_link = link.clone();
        let parser = FrameParser::new(config.parser.clone());
        let reader_done = writer_done.clone();
        tokio::spawn(async move {
            if let Err(e) = read_replies(&reader_link, read_half, parser, reader_done).await {
                reader_link.log_message(format!("read replies failed: {}", e));
            }
            reader_link.connected.store(false, Ordering::Release);
        });

        Self {
            config,
            log_channel,
            queue_tx,
            link,
            writer_done,
        }
    }

    /// Queues `command`. Returns `false` without queuing when the link is
    /// closed or the frame cannot be built.
    pub fn send_command(&self, command: Command) -> bool {
        if !self.is_connected() || self.link.closing.load(Ordering::Acquire) {
            tracing::debug!("link closed, dropping {:?}", command);
            return false;
        }
        let frame = match OutboundFrame::from_command(&command) {
            Ok(frame) => frame,
            Err(e) => {
                self.link.log_message(format!("Failed to build frame: {}", e));
                return false;
            }
        };
        self.queue_tx.send(DriverMessage::Frame(frame)).is_ok()
    }

    /// Sends the joints selected by `mask`. `speed` is clamped to 1..=255.
    pub fn apply_pose(&self, joints: &JointSet, mask: JointMask, speed: i32) -> bool {
        let command = Command::pose_from_joints(joints, mask, speed);
        match &command {
            Command::Pose { servos, .. } if servos.is_empty() => false,
            _ => self.send_command(command),
        }
    }

    pub fn apply_pose_all(&self, joints: &JointSet, speed: i32) -> bool {
        self.apply_pose(joints, JointMask::FULL_BODY, speed)
    }

    pub fn relax_all(&self) -> bool {
        self.send_command(Command::RelaxAll)
    }

    pub fn request_battery(&self) -> bool {
        self.send_command(Command::BatteryRequest)
    }

    pub fn request_flash_dump(&self, page: u8) -> bool {
        self.send_command(Command::FlashDump { page })
    }

    pub fn set_stretch(&self, mask: JointMask, stretch: i32, others: Option<i32>) -> bool {
        self.send_command(Command::stretch(mask, stretch, others))
    }

    pub fn set_servo_speed(&self, mask: JointMask, speed: i32, others: Option<i32>) -> bool {
        self.send_command(Command::servo_speed(mask, speed, others))
    }

    pub fn subscribe_replies(&self) -> broadcast::Receiver<ReplyFrame> {
        self.link.reply_channel.subscribe()
    }

    pub fn burst_state(&self) -> BurstState {
        self.link.burst.state()
    }

    pub fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::Acquire)
    }

    /// Requests shutdown: the writer flushes what is queued, sends one
    /// relax-all frame and closes the stream. Idempotent and callable from
    /// any context.
    pub fn close(&self) {
        if self.link.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.queue_tx.send(DriverMessage::Close);
    }

    /// [`close`](Self::close) and wait until the writer has finished.
    pub async fn close_and_wait(&self) {
        self.close();
        let mut done = self.writer_done.clone();
        let _ = done.wait_for(|finished| *finished).await;
    }
}

async fn send_queue_to_robot<S: AsyncWrite>(
    link: &LinkState,
    mut writer: WriteHalf<S>,
    mut queue_rx: mpsc::UnboundedReceiver<DriverMessage>,
    period: Duration,
) -> Result<(), LinkError> {
    let mut cycle = SendCycle::new();
    loop {
        let start_time = Instant::now();

        let mut drained = Vec::new();
        let mut close_requested = false;
        loop {
            match queue_rx.try_recv() {
                Ok(DriverMessage::Frame(frame)) => drained.push(frame),
                Ok(DriverMessage::Close) => {
                    close_requested = true;
                    break;
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    close_requested = true;
                    break;
                }
            }
        }

        for bytes in cycle.plan(drained, link.burst.state()) {
            write_frame(link, &mut writer, &bytes).await?;
        }

        if close_requested {
            discard_after_close(&mut queue_rx);
            let relax = Command::RelaxAll.build()?;
            write_frame(link, &mut writer, &relax).await?;
            writer.flush().await.map_err(|e| LinkError::FailedToSend(e.to_string()))?;
            if let Err(e) = writer.shutdown().await {
                tracing::debug!("shutdown after relax failed: {}", e);
            }
            break;
        }

        let elapsed = start_time.elapsed();
        if elapsed < period {
            sleep(period - elapsed).await;
        } else {
            link.log_message(format!("Send loop duration took {:?} exceeding max time:{:?}", elapsed, period));
        }
    }

    link.log_message("Disconnecting from robot... closing send queue");
    Ok(())
}

/// Empties the queue once a close was taken off it. Returns how many frames
/// were dropped.
fn discard_after_close(queue_rx: &mut mpsc::UnboundedReceiver<DriverMessage>) -> usize {
    let mut discarded = 0;
    while let Ok(message) = queue_rx.try_recv() {
        if let DriverMessage::Frame(frame) = message {
            tracing::debug!("link closing, dropping queued frame {}", hex::to_hex(&frame.bytes));
            discarded += 1;
        }
    }
    discarded
}

async fn write_frame<S: AsyncWrite>(link: &LinkState, writer: &mut WriteHalf<S>, bytes: &[u8]) -> Result<(), LinkError> {
    if let Err(e) = writer.write_all(bytes).await {
        link.connected.store(false, Ordering::Release);
        let err = LinkError::FailedToSend(e.to_string());
        link.log_message(err.to_string());
        return Err(err);
    }
    link.log_message(format!("Sent: {}", hex::to_hex(bytes)));
    Ok(())
}

async fn read_replies<S: AsyncRead>(
    link: &LinkState,
    mut reader: ReadHalf<S>,
    mut parser: FrameParser,
    mut writer_done: watch::Receiver<bool>,
) -> Result<(), LinkError> {
    let mut buf = vec![0; 1024];
    let mut resets = 0;
    loop {
        let n = tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => return Err(LinkError::Disconnected()),
                Ok(n) => n,
                Err(e) => return Err(LinkError::FailedToReceive(e.to_string())),
            },
            _ = writer_done.wait_for(|finished| *finished) => return Ok(()),
        };

        for frame in parser.push(&buf[..n]) {
            process_frame(link, frame);
        }
        let stats = parser.stats();
        if stats.resets != resets {
            resets = stats.resets;
            tracing::warn!("inbound buffer overflowed without a frame, resynchronizing ({} resets)", resets);
        }
    }
}

fn process_frame(link: &LinkState, frame: ReplyFrame) {
    link.log_message(format!("received: {}", frame.to_hex()));
    if !frame.checksum_ok {
        tracing::warn!("discarding reply with bad checksum: {}", frame.to_hex());
        return;
    }
    if let Some(state) = link.burst.observe(&frame.reply()) {
        link.log_message(format!("burst state -> {:?}", state));
    }
    let _ = link.reply_channel.send(frame);
}

async fn connect_with_retries(addr: &str, retries: u32, delay: Duration) -> Result<TcpStream, LinkError> {
    for attempt in 0..retries {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::warn!("Failed to connect to {} (attempt {}): {}", addr, attempt + 1, e);
                if attempt + 1 == retries {
                    return Err(LinkError::Connection(e.to_string()));
                }
                sleep(delay).await;
            }
        }
    }
    Err(LinkError::Connection(format!("no attempts made to reach {}", addr)))
}
