//! An authenticated remote shell session to the envbox VM, built on a
//! real SSH transport rather than a one-shot `limactl shell` subprocess
//! call: the Environment Controller needs streaming, cancellation, and
//! interactive PTY attachment that `Command::output()` cannot provide.

use std::io::{IsTerminal, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ssh2::Session;
use tracing::{info, warn};

use envbox_core::context::Ctx;
use envbox_vm::{VMInstance, VmController, VmStatus};

use crate::auth;
use crate::error::{ExitError, RemoteError};
use crate::pipe::{PipeHandles, PipeReader, PipeWriter};
use crate::term::{self, RawModeGuard};

const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RemoteSession {
    instance_name: String,
    vm: VMInstance,
    user: String,
    conn: Mutex<Option<Session>>,
    /// A duplicated handle to the transport socket, kept outside `conn` so
    /// a cancellation can shut it down without taking the same lock a
    /// blocked worker thread holds across a blocking read.
    cancel_sock: Mutex<Option<TcpStream>>,
}

impl RemoteSession {
    /// Load the instance record for `instance_name` and fail fast if it
    /// is not `Running`.
    pub fn new(instance_name: &str) -> Result<Self, RemoteError> {
        let vm = VmController::new(instance_name).get_instance()?;
        if vm.status != VmStatus::Running {
            return Err(RemoteError::NotRunning {
                name: instance_name.to_string(),
                status: vm.status.to_string(),
            });
        }
        let user = vm.config_user.clone().unwrap_or_else(|| "lima".to_string());
        Ok(RemoteSession {
            instance_name: instance_name.to_string(),
            vm,
            user,
            conn: Mutex::new(None),
            cancel_sock: Mutex::new(None),
        })
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn is_connected(&self) -> bool {
        matches!(&*self.conn.lock().unwrap(), Some(s) if s.authenticated())
    }

    /// Idempotent: a no-op if already connected.
    pub fn connect(&self) -> Result<(), RemoteError> {
        if self.is_connected() {
            return Ok(());
        }

        let candidates = auth::key_search_paths(Path::new(&self.vm.directory));
        let keys = auth::load_keys(&candidates);
        if keys.is_empty() {
            return Err(RemoteError::NoCredentials {
                searched: candidates.len(),
            });
        }

        let endpoint = format!("127.0.0.1:{}", self.vm.ssh_port);
        let addr: SocketAddr = endpoint
            .parse()
            .map_err(|_| RemoteError::SessionFailure(format!("invalid endpoint {endpoint}")))?;
        let tcp = TcpStream::connect_timeout(&addr, DIAL_TIMEOUT).map_err(|source| {
            RemoteError::DialFailure {
                endpoint: endpoint.clone(),
                source,
            }
        })?;
        tcp.set_nodelay(true).ok();
        let cancel_sock = tcp.try_clone().map_err(RemoteError::Io)?;

        let mut sess = Session::new()?;
        sess.set_tcp_stream(tcp);
        sess.handshake()?;

        // Host-key verification is intentionally disabled: this is a
        // loopback connection to a VM we ourselves created and manage.
        // Do not reuse this session for a non-local host.
        let mut authenticated = false;
        for key in &keys {
            if sess
                .userauth_pubkey_file(&self.user, None, &key.path, None)
                .is_ok()
            {
                authenticated = true;
                break;
            }
        }
        if !authenticated {
            return Err(RemoteError::NoCredentials {
                searched: keys.len(),
            });
        }

        info!(instance = %self.instance_name, endpoint = %endpoint, user = %self.user, "connected remote session");
        *self.conn.lock().unwrap() = Some(sess);
        *self.cancel_sock.lock().unwrap() = Some(cancel_sock);
        Ok(())
    }

    /// Idempotent: releases the transport handle. A later call re-dials.
    pub fn close(&self) {
        *self.conn.lock().unwrap() = None;
        *self.cancel_sock.lock().unwrap() = None;
    }

    /// Forcibly unblocks any in-flight read or write on this session's
    /// transport by shutting down the duplicated socket handle. The
    /// ssh2-owned descriptor shares the same underlying socket, so a
    /// blocking syscall it is parked in observes the shutdown and returns
    /// immediately instead of waiting for the remote side.
    fn interrupt_transport(&self) {
        if let Some(sock) = self.cancel_sock.lock().unwrap().as_ref() {
            let _ = sock.shutdown(std::net::Shutdown::Both);
        }
    }

    fn ensure_connected(&self) -> Result<(), RemoteError> {
        if self.is_connected() {
            Ok(())
        } else {
            self.connect()
        }
    }

    /// One-shot, buffered. Equivalent to `exec_ctx` with a background
    /// (never-canceling) context.
    pub fn exec(&self, cmd: &str) -> Result<(String, Option<ExitError>), RemoteError> {
        self.exec_ctx(&Ctx::background(), cmd)
    }

    /// Cancelable: on `ctx` cancellation the transport is shut down and
    /// the call returns within one polling interval, without waiting for
    /// the remote command to finish on its own.
    pub fn exec_ctx(&self, ctx: &Ctx, cmd: &str) -> Result<(String, Option<ExitError>), RemoteError> {
        self.ensure_connected()?;

        let result = {
            let guard = self.conn.lock().unwrap();
            let sess = guard.as_ref().ok_or(RemoteError::Disconnected)?;

            std::thread::scope(|scope| {
                let mut channel = sess.channel_session()?;
                channel.exec(cmd)?;

                // The worker owns the channel outright; no other thread
                // touches it, so a blocking read here never contends with
                // the cancellation check below.
                let worker = scope.spawn(move || -> Result<(String, i32), RemoteError> {
                    let mut output = String::new();
                    channel.read_to_string(&mut output)?;
                    channel.wait_close()?;
                    let code = channel.exit_status()?;
                    Ok((output, code))
                });

                loop {
                    if worker.is_finished() {
                        break;
                    }
                    if let Some(err) = ctx.err() {
                        self.interrupt_transport();
                        let _ = worker.join();
                        return Err(RemoteError::Canceled(err));
                    }
                    std::thread::sleep(ctx.poll_interval(Duration::from_millis(50)));
                }

                let (output, code) = worker
                    .join()
                    .map_err(|_| RemoteError::SessionFailure("exec worker panicked".to_string()))??;
                Ok(to_exec_result(output, code))
            })
        };

        // The shutdown socket leaves the session unusable; drop it so the
        // next call reconnects instead of hanging on a dead transport.
        if matches!(result, Err(RemoteError::Canceled(_))) {
            self.close();
        }
        result
    }

    /// Like `exec_ctx`, but stdout/stderr are pumped to the host's
    /// standard error as they arrive instead of being buffered.
    pub fn exec_stream(&self, ctx: &Ctx, cmd: &str) -> Result<Option<ExitError>, RemoteError> {
        self.ensure_connected()?;

        let result = {
            let guard = self.conn.lock().unwrap();
            let sess = guard.as_ref().ok_or(RemoteError::Disconnected)?;

            std::thread::scope(|scope| {
                let mut channel = sess.channel_session()?;
                channel.exec(cmd)?;

                // A single worker drains both streams in turn, so there is
                // no second thread contending for the channel: nothing for
                // the cancellation check to starve or deadlock against.
                let worker = scope.spawn(move || -> Result<i32, RemoteError> {
                    pump_both_streams(&mut channel, &mut std::io::stderr(), &mut std::io::stderr())?;
                    channel.wait_close()?;
                    Ok(channel.exit_status()?)
                });

                loop {
                    if worker.is_finished() {
                        break;
                    }
                    if let Some(err) = ctx.err() {
                        self.interrupt_transport();
                        let _ = worker.join();
                        return Err(RemoteError::Canceled(err));
                    }
                    std::thread::sleep(ctx.poll_interval(Duration::from_millis(50)));
                }

                let code = worker
                    .join()
                    .map_err(|_| RemoteError::SessionFailure("stream pump worker panicked".to_string()))??;
                Ok((code != 0).then_some(ExitError { code }))
            })
        };

        if matches!(result, Err(RemoteError::Canceled(_))) {
            self.close();
        }
        result
    }

    /// Allocates a PTY when stdin is a terminal, switches the host
    /// terminal to raw mode for the duration of the call, and attaches
    /// stdin/stdout/stderr. Requests (best-effort) SSH agent forwarding
    /// when `SSH_AUTH_SOCK` is set.
    pub fn exec_interactive(&self, cmd: &str) -> Result<(), RemoteError> {
        self.ensure_connected()?;
        let guard = self.conn.lock().unwrap();
        let sess = guard.as_ref().ok_or(RemoteError::Disconnected)?;

        let is_tty = std::io::stdin().is_terminal();
        let mut channel = sess.channel_session()?;

        if is_tty {
            let (cols, rows) = term::terminal_size();
            channel.request_pty("xterm-256color", None, Some((cols as u32, rows as u32, 0, 0)))?;
        }

        if std::env::var_os("SSH_AUTH_SOCK").is_some() {
            if let Err(e) = channel.request_auth_agent_forwarding() {
                warn!(error = %e, "SSH agent forwarding request failed; continuing without it");
            }
        }

        channel.exec(cmd)?;

        // Scope guard: restored on every exit path below, including `?`
        // propagation, regardless of which branch returns first.
        let _raw_guard = if is_tty {
            Some(RawModeGuard::enter()?)
        } else {
            None
        };

        let channel = Arc::new(Mutex::new(channel));
        {
            let channel = Arc::clone(&channel);
            std::thread::spawn(move || {
                let mut buf = [0u8; 4096];
                loop {
                    let n = match std::io::stdin().read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    let mut ch = channel.lock().unwrap();
                    if ch.write_all(&buf[..n]).is_err() {
                        break;
                    }
                }
            });
            // Detached: this reader blocks on host stdin and may outlive
            // the remote command; it dies with the process, never holds
            // up `exec_interactive`'s return.
        }

        // stdout and stderr are pumped on separate threads: draining one
        // stream to EOF while the remote side blocks writing to the
        // other would otherwise deadlock the session.
        let stdout_channel = Arc::clone(&channel);
        let stdout_worker =
            std::thread::spawn(move || pump_stream(&stdout_channel, 0, &mut std::io::stdout()));
        pump_stream(&channel, 1, &mut std::io::stderr())?;
        stdout_worker
            .join()
            .map_err(|_| RemoteError::SessionFailure("stdout pump panicked".to_string()))??;
        channel.lock().unwrap().wait_close()?;
        Ok(())
    }

    /// Non-blocking start: spawns the remote command and a bridging
    /// thread, returning handles the caller drains at its own pace.
    pub fn exec_pipe(&self, cmd: &str) -> Result<PipeHandles, RemoteError> {
        self.ensure_connected()?;
        let mut channel = {
            let guard = self.conn.lock().unwrap();
            let sess = guard.as_ref().ok_or(RemoteError::Disconnected)?;
            let mut channel = sess.channel_session()?;
            channel.exec(cmd)?;
            channel
        };

        let (stdin_tx, stdin_rx) = std::sync::mpsc::channel::<Vec<u8>>();
        let (stdout_tx, stdout_rx) = std::sync::mpsc::channel::<std::io::Result<Vec<u8>>>();
        let (stderr_tx, stderr_rx) = std::sync::mpsc::channel::<std::io::Result<Vec<u8>>>();

        std::thread::spawn(move || {
            let mut out_buf = [0u8; 4096];
            let mut err_buf = [0u8; 4096];
            loop {
                while let Ok(chunk) = stdin_rx.try_recv() {
                    if channel.write_all(&chunk).is_err() {
                        return;
                    }
                }
                match channel.read(&mut out_buf) {
                    Ok(0) => {}
                    Ok(n) => {
                        if stdout_tx.send(Ok(out_buf[..n].to_vec())).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = stdout_tx.send(Err(e));
                    }
                }
                match channel.stderr().read(&mut err_buf) {
                    Ok(0) => {}
                    Ok(n) => {
                        if stderr_tx.send(Ok(err_buf[..n].to_vec())).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = stderr_tx.send(Err(e));
                    }
                }
                if channel.eof() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
        });

        Ok(PipeHandles {
            stdin: PipeWriter::new(stdin_tx),
            stdout: PipeReader::new(stdout_rx),
            stderr: PipeReader::new(stderr_rx),
        })
    }
}

fn to_exec_result(output: String, code: i32) -> (String, Option<ExitError>) {
    if code == 0 {
        (output, None)
    } else {
        (output, Some(ExitError { code }))
    }
}

fn pump_stream(
    channel: &Mutex<ssh2::Channel>,
    stream_id: i32,
    out: &mut dyn Write,
) -> Result<(), RemoteError> {
    let mut buf = [0u8; 4096];
    loop {
        let n = {
            let mut ch = channel.lock().unwrap();
            let mut stream = ch.stream(stream_id);
            stream.read(&mut buf)?
        };
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
    }
    Ok(())
}

/// Drains stdout and stderr of a single channel from one thread, so
/// neither stream's reader ever waits on a lock held by the other. Runs
/// until the channel reports EOF on both.
fn pump_both_streams(
    channel: &mut ssh2::Channel,
    stdout_out: &mut dyn Write,
    stderr_out: &mut dyn Write,
) -> Result<(), RemoteError> {
    let mut out_buf = [0u8; 4096];
    let mut err_buf = [0u8; 4096];
    loop {
        let n_out = channel.read(&mut out_buf)?;
        if n_out > 0 {
            stdout_out.write_all(&out_buf[..n_out])?;
        }
        let n_err = channel.stderr().read(&mut err_buf)?;
        if n_err > 0 {
            stderr_out.write_all(&err_buf[..n_err])?;
        }
        if n_out == 0 && n_err == 0 && channel.eof() {
            break;
        }
    }
    Ok(())
}
