//! Chrome Trace ("flame style") profiling.
//!
//! Feature-gated with `--features profiling`.
//!
//! Usage:
//!   framesched::profiler::init("profile/trace.json");
//!   {
//!     let _g = framesched::profiler::span("frame::1");
//!     // run a frame...
//!   }
//!   framesched::profiler::shutdown();

use std::borrow::Cow;
use std::fmt;
use std::path::Path;

#[cfg(feature = "profiling")]
mod enabled {
    use std::fs::File;
    use std::io::{BufWriter, Write};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Mutex, OnceLock};
    use std::time::Instant;

    use super::*;


    /// A Chrome trace "complete event" (`ph:"X"`) plus optional metadata
    /// events (`ph:"M"`).
    #[derive(Debug)]
    enum TraceEvent {
        Complete {
            name: String,
            ts_us: u64,
            dur_us: u64,
            tid: u64,
            args: Vec<(String, Arg)>,
        },
        ThreadName {
            ts_us: u64,
            tid: u64,
            name: String,
        },
    }

    struct ProfilerState {
        start: Instant,
        out_path: PathBuf,
        is_on: AtomicBool,
        events: Mutex<Vec<TraceEvent>>,
    }

    static STATE: OnceLock<ProfilerState> = OnceLock::new();
    static NEXT_TID: AtomicU64 = AtomicU64::new(1);

    thread_local! {
        static TID: u64 = NEXT_TID.fetch_add(1, Ordering::Relaxed);
    }

    fn now_us(st: &ProfilerState) -> u64 {
        st.start.elapsed().as_micros() as u64
    }

    fn tid() -> u64 {
        TID.with(|t| *t)
    }

    /// Initialize the profiler and set output path.
    pub fn init<P: AsRef<Path>>(path: P) {
        let out_path = path.as_ref().to_path_buf();
        let _ = STATE.set(ProfilerState {
            start: Instant::now(),
            out_path,
            is_on: AtomicBool::new(true),
            events: Mutex::new(Vec::new()),
        });
    }

    /// Shut down the profiler and write the Chrome Trace JSON.
    pub fn shutdown() {
        if let Some(st) = STATE.get() {
            // Stop accepting new events (best-effort; spans already
            // in-flight may still push).
            st.is_on.store(false, Ordering::Release);

            if let Err(e) = write_trace_file(st) {
                eprintln!("profiler::shutdown failed to write trace: {e}");
            }
        }
    }

    fn write_trace_file(st: &ProfilerState) -> std::io::Result<()> {
        let events = {
            let mut guard = st.events.lock().unwrap();
            std::mem::take(&mut *guard)
        };

        if let Some(parent) = st.out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let f = File::create(&st.out_path)?;
        let mut w = BufWriter::new(f);

        write!(w, "{{\"traceEvents\":[")?;
        let mut first = true;
        for ev in events {
            if !first {
                write!(w, ",")?;
            }
            first = false;
            match ev {
                TraceEvent::Complete { name, ts_us, dur_us, tid, args } => {
                    write!(w, "{{\"name\":")?;
                    write_json_string(&mut w, &name)?;
                    write!(
                        w,
                        ",\"cat\":\"sched\",\"ph\":\"X\",\"ts\":{},\"dur\":{},\"pid\":1,\"tid\":{}",
                        ts_us, dur_us, tid
                    )?;
                    if !args.is_empty() {
                        write!(w, ",\"args\":{{")?;
                        let mut a_first = true;
                        for (k, v) in args {
                            if !a_first {
                                write!(w, ",")?;
                            }
                            a_first = false;
                            write_json_string(&mut w, &k)?;
                            write!(w, ":")?;
                            v.write_json(&mut w)?;
                        }
                        write!(w, "}}")?;
                    }
                    write!(w, "}}")?;
                }
                TraceEvent::ThreadName { ts_us, tid, name } => {
                    write!(
                        w,
                        "{{\"name\":\"thread_name\",\"ph\":\"M\",\"ts\":{},\"pid\":1,\"tid\":{},\"args\":{{\"name\":",
                        ts_us, tid
                    )?;
                    write_json_string(&mut w, &name)?;
                    write!(w, "}}}}")?;
                }
            }
        }
        write!(w, "]}}")?;
        w.flush()?;
        Ok(())
    }

    fn write_json_string<W: Write>(w: &mut W, s: &str) -> std::io::Result<()> {
        write!(w, "\"")?;
        for ch in s.chars() {
            match ch {
                '"' => write!(w, "\\\"")?,
                '\\' => write!(w, "\\\\")?,
                '\n' => write!(w, "\\n")?,
                '\r' => write!(w, "\\r")?,
                '\t' => write!(w, "\\t")?,
                c if c.is_control() => write!(w, "\\u{:04x}", c as u32)?,
                c => write!(w, "{c}")?,
            }
        }
        write!(w, "\"")?;
        Ok(())
    }

    impl super::Arg {
        fn write_json<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
            match self {
                Arg::Str(s) => write_json_string(w, s),
                Arg::U64(v) => write!(w, "{}", v),
                Arg::F64(v) => {
                    if v.is_finite() {
                        write!(w, "{}", v)
                    } else {
                        write_json_string(w, &format!("{v}"))
                    }
                }
                Arg::Bool(v) => write!(w, "{}", if *v { "true" } else { "false" }),
            }
        }
    }

    fn push_event(ev: TraceEvent) {
        let st = match STATE.get() {
            Some(s) => s,
            None => return,
        };
        if !st.is_on.load(Ordering::Acquire) {
            return;
        }
        let mut guard = st.events.lock().unwrap();
        guard.push(ev);
    }

    /// Assign a human-friendly thread name (shown in Perfetto/Chrome
    /// tracing).
    pub fn thread_name(name: impl Into<String>) {
        let st = match STATE.get() {
            Some(s) => s,
            None => return,
        };
        let ev = TraceEvent::ThreadName {
            ts_us: now_us(st),
            tid: tid(),
            name: name.into(),
        };
        push_event(ev);
    }

    /// Create a profiling span.
    pub fn span(name: impl Into<super::SpanName>) -> SpanGuard {
        let st = match STATE.get() {
            Some(s) => s,
            None => return SpanGuard::disabled(),
        };
        if !st.is_on.load(Ordering::Acquire) {
            return SpanGuard::disabled();
        }

        SpanGuard {
            name: name.into().0.into_owned(),
            ts0: now_us(st),
            tid: tid(),
            args: Vec::new(),
            active: true,
        }
    }

    /// Create a profiling span using format_args without forcing the
    /// caller to allocate manually.
    pub fn span_fmt(args: fmt::Arguments<'_>) -> SpanGuard {
        span(args.to_string())
    }

    /// A RAII guard that records a Chrome Trace complete event on drop.
    pub struct SpanGuard {
        name: String,
        ts0: u64,
        tid: u64,
        args: Vec<(String, Arg)>,
        active: bool,
    }

    impl SpanGuard {
        fn disabled() -> Self {
            Self {
                name: String::new(),
                ts0: 0,
                tid: 0,
                args: Vec::new(),
                active: false,
            }
        }

        /// Attach an argument to this span (builder-style).
        #[inline]
        pub fn arg(mut self, key: impl Into<String>, value: super::Arg) -> Self {
            if self.active {
                self.args.push((key.into(), value));
            }
            self
        }
    }

    impl Drop for SpanGuard {
        fn drop(&mut self) {
            if !self.active {
                return;
            }
            let st = match STATE.get() {
                Some(s) => s,
                None => return,
            };
            let ts1 = now_us(st);
            let dur = ts1.saturating_sub(self.ts0);
            push_event(TraceEvent::Complete {
                name: std::mem::take(&mut self.name),
                ts_us: self.ts0,
                dur_us: dur,
                tid: self.tid,
                args: std::mem::take(&mut self.args),
            });
        }
    }
}

#[cfg(not(feature = "profiling"))]
mod disabled {
    use super::*;

    /// Initialize profiler (no-op when profiling is disabled).
    #[inline]
    pub fn init<P: AsRef<Path>>(_path: P) {}

    /// Shut down profiler (no-op).
    #[inline]
    pub fn shutdown() {}

    /// Set thread name (no-op).
    #[inline]
    pub fn thread_name(_name: impl Into<String>) {}

    /// Create profiling span (no-op).
    #[inline]
    pub fn span(_name: impl Into<super::SpanName>) -> SpanGuard {
        SpanGuard
    }

    /// Create profiling span using format_args (no-op).
    #[inline]
    pub fn span_fmt(_args: fmt::Arguments<'_>) -> SpanGuard {
        SpanGuard
    }

    /// No-op span guard.
    pub struct SpanGuard;

    impl SpanGuard {
        /// Attach an argument to this span (builder-style; no-op).
        #[inline]
        pub fn arg(self, _key: impl Into<String>, _value: super::Arg) -> Self {
            self
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API surface (stable regardless of feature flag)
// ─────────────────────────────────────────────────────────────────────────────

/// A span name; accepts `&'static str`, `String`, or `Cow<'static, str>`.
pub struct SpanName(pub Cow<'static, str>);

impl From<&'static str> for SpanName {
    fn from(s: &'static str) -> Self {
        SpanName(Cow::Borrowed(s))
    }
}
impl From<String> for SpanName {
    fn from(s: String) -> Self {
        SpanName(Cow::Owned(s))
    }
}
impl From<Cow<'static, str>> for SpanName {
    fn from(s: Cow<'static, str>) -> Self {
        SpanName(s)
    }
}

/// Argument value for profiling spans.
///
/// These values are serialized into the `args` field of Chrome Trace
/// events and can be inspected in Perfetto or `chrome://tracing`.
#[derive(Debug)]
pub enum Arg {
    /// UTF-8 string value.
    Str(String),

    /// Unsigned 64-bit integer value.
    U64(u64),

    /// 64-bit floating-point value.
    F64(f64),

    /// Boolean value.
    Bool(bool),
}

// Re-export correct backend
#[cfg(feature = "profiling")]
pub use enabled::SpanGuard;

#[cfg(not(feature = "profiling"))]
pub use disabled::SpanGuard;

#[cfg(feature = "profiling")]
pub use enabled::{init, shutdown, span, span_fmt, thread_name};

#[cfg(not(feature = "profiling"))]
pub use disabled::{init, shutdown, span, span_fmt, thread_name};
