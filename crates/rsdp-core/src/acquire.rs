//! Device acquisition
//!
//! Acquiring the device for a stage is "enumerate, else wait":
//!
//! 1. Enumerate present devices with the stage's VID/PID. With a USB path
//!    filter, keep only the candidate whose topology path matches; the first
//!    match in enumeration order wins.
//! 2. Open the match if there is one.
//! 3. Otherwise fail, or block in the [`WaitStrategy`] when waiting was
//!    requested.
//!
//! Two wait strategies exist, picked at build time by the binary:
//! - [`HotplugWait`] subscribes to arrival notifications and gives up after
//!   [`HOTPLUG_TIMEOUT`]. It can resolve topology paths. An arrival is
//!   reported before its interfaces are set up, so opening it is retried
//!   until the same deadline.
//! - [`PollingWait`] retries an open-by-ID every [`POLL_INTERVAL`] forever. It
//!   cannot resolve topology paths, so a path filter is rejected up front.

use std::time::{Duration, Instant};

use crate::error::AcquireError;

/// Upper bound for a hotplug wait
pub const HOTPLUG_TIMEOUT: Duration = Duration::from_millis(5000);

/// Delay between open attempts on a device that just arrived
pub const ARRIVAL_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Delay between open attempts of the polling fallback
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// What a stage wants to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target<'a> {
    pub vid: u16,
    pub pid: u16,
    /// USB topology path filter, e.g. `3-1.1`
    pub usb_path: Option<&'a str>,
}

impl<'a> Target<'a> {
    pub fn new(vid: u16, pid: u16, usb_path: Option<&'a str>) -> Self {
        Self { vid, pid, usb_path }
    }
}

/// HID device enumeration and opening
pub trait HidBus {
    /// Open device handle
    type Device;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Access paths of present devices with this VID/PID, in enumeration order
    fn enumerate(&mut self, vid: u16, pid: u16) -> Result<Vec<String>, Self::Error>;

    /// Open the device at an access path returned by enumeration or hotplug
    fn open_path(&mut self, path: &str) -> Result<Self::Device, Self::Error>;

    /// Open the first device with this VID/PID
    fn open_id(&mut self, vid: u16, pid: u16) -> Result<Self::Device, Self::Error>;
}

/// A device arrival reported by a hotplug source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arrival {
    /// VID as reported by the event itself
    pub vid: u16,
    /// PID as reported by the event itself
    pub pid: u16,
    /// Path the bus can open
    pub access_path: String,
    /// Topology path, if the event carried it
    pub usb_path: Option<String>,
}

/// Hotplug notification and topology service
pub trait HotplugSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Start collecting arrivals; nothing before this call is reported
    fn subscribe(&mut self) -> Result<(), Self::Error>;

    /// Next arrival since subscribing, or `None` once `timeout` elapsed
    fn next_arrival(&mut self, timeout: Duration) -> Result<Option<Arrival>, Self::Error>;

    /// Topology path of the device behind an access path
    fn usb_path(&mut self, access_path: &str) -> Result<Option<String>, Self::Error>;
}

/// How to block until a device shows up
pub trait WaitStrategy<B: HidBus> {
    /// Whether topology paths can be resolved at all
    fn supports_usb_path(&self) -> bool;

    /// Topology path of an enumerated device
    fn usb_path_of(&mut self, access_path: &str) -> Result<Option<String>, AcquireError>;

    /// Called before enumeration when a wait may follow
    fn arm(&mut self) -> Result<(), AcquireError>;

    /// Block until the target can be opened
    fn wait(&mut self, bus: &mut B, target: &Target<'_>) -> Result<B::Device, AcquireError>;
}

/// Anything that can hand out a device for a stage
pub trait DeviceProvider {
    type Device;

    /// Acquire the target, waiting for it if `wait` is set
    fn acquire(&mut self, target: &Target<'_>, wait: bool) -> Result<Self::Device, AcquireError>;
}

fn open_error<E>(path: &str, e: E) -> AcquireError
where
    E: std::error::Error + Send + Sync + 'static,
{
    AcquireError::Open {
        path: path.to_string(),
        source: Box::new(e),
    }
}

// ---------------------------------------------------------------------------
// Hotplug strategy
// ---------------------------------------------------------------------------

/// Wait on hotplug arrivals, bounded by a timeout
pub struct HotplugWait<S> {
    source: S,
    timeout: Duration,
}

impl<S: HotplugSource> HotplugWait<S> {
    /// Hotplug wait with [`HOTPLUG_TIMEOUT`]
    pub fn new(source: S) -> Self {
        Self::with_timeout(source, HOTPLUG_TIMEOUT)
    }

    pub fn with_timeout(source: S, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Underlying hotplug source
    pub fn source(&self) -> &S {
        &self.source
    }

    fn arrival_matches(
        &mut self,
        arrival: &Arrival,
        target: &Target<'_>,
    ) -> Result<bool, AcquireError> {
        // The event's own IDs are used; the device attributes may not be
        // populated yet when the event fires.
        if arrival.vid != target.vid || arrival.pid != target.pid {
            return Ok(false);
        }
        let Some(wanted) = target.usb_path else {
            return Ok(true);
        };
        let found = match &arrival.usb_path {
            Some(path) => Some(path.clone()),
            None => self
                .source
                .usb_path(&arrival.access_path)
                .map_err(|e| AcquireError::Wait(Box::new(e)))?,
        };
        Ok(found.as_deref() == Some(wanted))
    }
}

fn open_arrival<B: HidBus>(
    bus: &mut B,
    path: &str,
    deadline: Instant,
) -> Result<B::Device, AcquireError> {
    loop {
        match bus.open_path(path) {
            Ok(device) => return Ok(device),
            Err(e) if Instant::now() + ARRIVAL_RETRY_INTERVAL < deadline => {
                log::trace!("Opening {} failed, retrying: {}", path, e);
                std::thread::sleep(ARRIVAL_RETRY_INTERVAL);
            }
            Err(e) => return Err(open_error(path, e)),
        }
    }
}

impl<B: HidBus, S: HotplugSource> WaitStrategy<B> for HotplugWait<S> {
    fn supports_usb_path(&self) -> bool {
        true
    }

    fn usb_path_of(&mut self, access_path: &str) -> Result<Option<String>, AcquireError> {
        self.source
            .usb_path(access_path)
            .map_err(|e| AcquireError::Wait(Box::new(e)))
    }

    fn arm(&mut self) -> Result<(), AcquireError> {
        self.source
            .subscribe()
            .map_err(|e| AcquireError::Wait(Box::new(e)))
    }

    fn wait(&mut self, bus: &mut B, target: &Target<'_>) -> Result<B::Device, AcquireError> {
        let timeout = self.timeout;
        let timed_out = || AcquireError::Timeout {
            vid: target.vid,
            pid: target.pid,
            timeout,
        };
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out());
            }

            let arrival = self
                .source
                .next_arrival(remaining)
                .map_err(|e| AcquireError::Wait(Box::new(e)))?;
            let Some(arrival) = arrival else {
                return Err(timed_out());
            };

            if !self.arrival_matches(&arrival, target)? {
                log::trace!(
                    "Ignoring arrival {:04x}:{:04x} at {}",
                    arrival.vid,
                    arrival.pid,
                    arrival.access_path
                );
                continue;
            }

            log::debug!("Device arrived at {}", arrival.access_path);
            return open_arrival(bus, &arrival.access_path, deadline);
        }
    }
}

// ---------------------------------------------------------------------------
// Polling strategy
// ---------------------------------------------------------------------------

/// Retry opening by VID/PID on a fixed interval, without an overall timeout
pub struct PollingWait {
    interval: Duration,
}

impl PollingWait {
    /// Polling wait with [`POLL_INTERVAL`]
    pub fn new() -> Self {
        Self::with_interval(POLL_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for PollingWait {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: HidBus> WaitStrategy<B> for PollingWait {
    fn supports_usb_path(&self) -> bool {
        false
    }

    fn usb_path_of(&mut self, _access_path: &str) -> Result<Option<String>, AcquireError> {
        Err(AcquireError::UnsupportedPathFilter)
    }

    fn arm(&mut self) -> Result<(), AcquireError> {
        Ok(())
    }

    fn wait(&mut self, bus: &mut B, target: &Target<'_>) -> Result<B::Device, AcquireError> {
        if target.usb_path.is_some() {
            return Err(AcquireError::UnsupportedPathFilter);
        }

        loop {
            std::thread::sleep(self.interval);
            match bus.open_id(target.vid, target.pid) {
                Ok(device) => return Ok(device),
                Err(e) => log::trace!("Open attempt failed: {}", e),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Acquirer
// ---------------------------------------------------------------------------

/// Device acquisition over a bus and a wait strategy
pub struct Acquirer<B, W> {
    bus: B,
    waiter: W,
}

impl<B: HidBus, W: WaitStrategy<B>> Acquirer<B, W> {
    pub fn new(bus: B, waiter: W) -> Self {
        Self { bus, waiter }
    }

    /// Underlying bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Underlying wait strategy
    pub fn waiter(&self) -> &W {
        &self.waiter
    }

    /// First present device matching the target, by access path
    fn find_present(&mut self, target: &Target<'_>) -> Result<Option<String>, AcquireError> {
        let candidates = self
            .bus
            .enumerate(target.vid, target.pid)
            .map_err(|e| AcquireError::Enumerate(Box::new(e)))?;

        let Some(wanted) = target.usb_path else {
            return Ok(candidates.into_iter().next());
        };

        for path in candidates {
            match self.waiter.usb_path_of(&path)? {
                Some(usb_path) if usb_path == wanted => return Ok(Some(path)),
                Some(usb_path) => log::debug!("Skipping {} at USB path {}", path, usb_path),
                None => log::debug!("Skipping {}: no USB parent", path),
            }
        }
        Ok(None)
    }
}

impl<B: HidBus, W: WaitStrategy<B>> DeviceProvider for Acquirer<B, W> {
    type Device = B::Device;

    fn acquire(&mut self, target: &Target<'_>, wait: bool) -> Result<B::Device, AcquireError> {
        if target.usb_path.is_some() && !self.waiter.supports_usb_path() {
            return Err(AcquireError::UnsupportedPathFilter);
        }

        // Subscribe before enumerating so an arrival in between is not lost
        if wait {
            self.waiter.arm()?;
        }

        if let Some(path) = self.find_present(target)? {
            log::debug!("Opening {}", path);
            return self.bus.open_path(&path).map_err(|e| open_error(&path, e));
        }

        if !wait {
            return Err(AcquireError::NotFound {
                vid: target.vid,
                pid: target.pid,
            });
        }

        log::info!("Waiting for device...");
        self.waiter.wait(&mut self.bus, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::fmt;

    #[derive(Debug)]
    struct BusError(&'static str);

    impl fmt::Display for BusError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for BusError {}

    /// Bus whose present devices are (access path, usb path) pairs
    #[derive(Default)]
    struct FakeBus {
        present: Vec<(String, String)>,
        opened: Vec<String>,
        open_id_failures: usize,
        open_id_calls: usize,
        open_path_failures: usize,
        open_path_calls: usize,
        refuse_open: bool,
    }

    impl HidBus for FakeBus {
        type Device = String;
        type Error = BusError;

        fn enumerate(&mut self, _vid: u16, _pid: u16) -> Result<Vec<String>, BusError> {
            Ok(self.present.iter().map(|(p, _)| p.clone()).collect())
        }

        fn open_path(&mut self, path: &str) -> Result<String, BusError> {
            self.open_path_calls += 1;
            if self.refuse_open {
                return Err(BusError("permission denied"));
            }
            if self.open_path_calls <= self.open_path_failures {
                return Err(BusError("no HID interface yet"));
            }
            self.opened.push(path.to_string());
            Ok(path.to_string())
        }

        fn open_id(&mut self, vid: u16, pid: u16) -> Result<String, BusError> {
            self.open_id_calls += 1;
            if self.open_id_calls <= self.open_id_failures {
                return Err(BusError("not there"));
            }
            Ok(format!("{:04x}:{:04x}", vid, pid))
        }
    }

    /// Hotplug source replaying scripted arrivals; topology from a table
    #[derive(Default)]
    struct FakeHotplug {
        subscribed: bool,
        arrivals: VecDeque<Arrival>,
        topology: Vec<(String, String)>,
    }

    impl HotplugSource for FakeHotplug {
        type Error = BusError;

        fn subscribe(&mut self) -> Result<(), BusError> {
            self.subscribed = true;
            Ok(())
        }

        fn next_arrival(&mut self, _timeout: Duration) -> Result<Option<Arrival>, BusError> {
            if !self.subscribed {
                return Err(BusError("not subscribed"));
            }
            Ok(self.arrivals.pop_front())
        }

        fn usb_path(&mut self, access_path: &str) -> Result<Option<String>, BusError> {
            Ok(self
                .topology
                .iter()
                .find(|(p, _)| p == access_path)
                .map(|(_, t)| t.clone()))
        }
    }

    fn arrival(vid: u16, pid: u16, path: &str, usb_path: Option<&str>) -> Arrival {
        Arrival {
            vid,
            pid,
            access_path: path.to_string(),
            usb_path: usb_path.map(String::from),
        }
    }

    fn bus_with(present: &[(&str, &str)]) -> FakeBus {
        FakeBus {
            present: present
                .iter()
                .map(|(p, t)| (p.to_string(), t.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    fn hotplug_for(bus: &FakeBus) -> FakeHotplug {
        FakeHotplug {
            topology: bus.present.clone(),
            ..Default::default()
        }
    }

    #[test]
    fn test_present_device_opened_without_wait() {
        let bus = bus_with(&[("1:004", "1-2"), ("1:005", "1-3")]);
        let hotplug = hotplug_for(&bus);
        let mut acq = Acquirer::new(bus, HotplugWait::new(hotplug));

        let dev = acq.acquire(&Target::new(0x15a2, 0x0080, None), false).unwrap();
        assert_eq!(dev, "1:004");
    }

    #[test]
    fn test_path_filter_selects_candidate() {
        let bus = bus_with(&[("1:004", "1-2"), ("1:005", "1-3")]);
        let hotplug = hotplug_for(&bus);
        let mut acq = Acquirer::new(bus, HotplugWait::new(hotplug));

        let dev = acq
            .acquire(&Target::new(0x15a2, 0x0080, Some("1-3")), false)
            .unwrap();
        assert_eq!(dev, "1:005");
    }

    #[test]
    fn test_not_found_without_wait() {
        let mut acq = Acquirer::new(FakeBus::default(), HotplugWait::new(FakeHotplug::default()));
        let err = acq
            .acquire(&Target::new(0x15a2, 0x0080, None), false)
            .unwrap_err();
        assert!(matches!(
            err,
            AcquireError::NotFound {
                vid: 0x15a2,
                pid: 0x0080
            }
        ));
    }

    #[test]
    fn test_path_filter_mismatch_is_not_found() {
        let bus = bus_with(&[("1:004", "1-2")]);
        let hotplug = hotplug_for(&bus);
        let mut acq = Acquirer::new(bus, HotplugWait::new(hotplug));
        let err = acq
            .acquire(&Target::new(0x15a2, 0x0080, Some("3-1.1")), false)
            .unwrap_err();
        assert!(matches!(err, AcquireError::NotFound { .. }));
    }

    #[test]
    fn test_open_failure_reported() {
        let mut bus = bus_with(&[("1:004", "1-2")]);
        bus.refuse_open = true;
        let mut acq = Acquirer::new(bus, HotplugWait::new(FakeHotplug::default()));
        let err = acq
            .acquire(&Target::new(0x15a2, 0x0080, None), true)
            .unwrap_err();
        assert!(matches!(err, AcquireError::Open { ref path, .. } if path == "1:004"));
    }

    #[test]
    fn test_hotplug_wait_filters_arrivals() {
        let hotplug = FakeHotplug {
            arrivals: VecDeque::from(vec![
                arrival(0x1234, 0x0080, "2:001", Some("2-1")),
                arrival(0x15a2, 0x0081, "2:002", Some("2-1")),
                arrival(0x15a2, 0x0080, "2:003", Some("2-2")),
                arrival(0x15a2, 0x0080, "2:004", Some("2-1")),
            ]),
            ..Default::default()
        };
        let mut acq = Acquirer::new(FakeBus::default(), HotplugWait::new(hotplug));

        let dev = acq
            .acquire(&Target::new(0x15a2, 0x0080, Some("2-1")), true)
            .unwrap();
        assert_eq!(dev, "2:004");
        assert_eq!(acq.bus().opened, vec!["2:004".to_string()]);
    }

    #[test]
    fn test_hotplug_resolves_missing_topology() {
        let hotplug = FakeHotplug {
            arrivals: VecDeque::from(vec![arrival(0x15a2, 0x0080, "2:007", None)]),
            topology: vec![("2:007".into(), "2-4".into())],
            ..Default::default()
        };
        let mut acq = Acquirer::new(FakeBus::default(), HotplugWait::new(hotplug));
        let dev = acq
            .acquire(&Target::new(0x15a2, 0x0080, Some("2-4")), true)
            .unwrap();
        assert_eq!(dev, "2:007");
    }

    #[test]
    fn test_arrival_open_retried_until_ready() {
        let bus = FakeBus {
            open_path_failures: 3,
            ..Default::default()
        };
        let hotplug = FakeHotplug {
            arrivals: VecDeque::from(vec![arrival(0x15a2, 0x0080, "2:005", Some("2-1"))]),
            ..Default::default()
        };
        let mut acq = Acquirer::new(bus, HotplugWait::new(hotplug));
        let dev = acq.acquire(&Target::new(0x15a2, 0x0080, None), true).unwrap();
        assert_eq!(dev, "2:005");
        assert_eq!(acq.bus().open_path_calls, 4);
    }

    #[test]
    fn test_arrival_open_gives_up_at_deadline() {
        let bus = FakeBus {
            refuse_open: true,
            ..Default::default()
        };
        let hotplug = FakeHotplug {
            arrivals: VecDeque::from(vec![arrival(0x15a2, 0x0080, "2:005", None)]),
            ..Default::default()
        };
        let mut acq = Acquirer::new(
            bus,
            HotplugWait::with_timeout(hotplug, Duration::from_millis(200)),
        );
        let err = acq
            .acquire(&Target::new(0x15a2, 0x0080, None), true)
            .unwrap_err();
        assert!(matches!(err, AcquireError::Open { ref path, .. } if path == "2:005"));
        assert!(acq.bus().open_path_calls > 1);
    }

    #[test]
    fn test_hotplug_timeout() {
        let hotplug = FakeHotplug {
            arrivals: VecDeque::from(vec![arrival(0x1111, 0x2222, "2:001", None)]),
            ..Default::default()
        };
        let mut acq = Acquirer::new(
            FakeBus::default(),
            HotplugWait::with_timeout(hotplug, Duration::from_millis(50)),
        );
        let err = acq
            .acquire(&Target::new(0x15a2, 0x0080, None), true)
            .unwrap_err();
        assert!(matches!(
            err,
            AcquireError::Timeout { timeout, .. } if timeout == Duration::from_millis(50)
        ));
        assert!(acq.waiter().source().subscribed);
    }

    #[test]
    fn test_polling_rejects_path_filter() {
        let mut bus = FakeBus::default();
        bus.open_id_failures = usize::MAX;
        let mut acq = Acquirer::new(bus, PollingWait::with_interval(Duration::ZERO));
        let err = acq
            .acquire(&Target::new(0x15a2, 0x0080, Some("1-1")), true)
            .unwrap_err();
        assert!(matches!(err, AcquireError::UnsupportedPathFilter));
        assert_eq!(acq.bus().open_id_calls, 0);
    }

    #[test]
    fn test_polling_retries_until_open() {
        // No overall timeout: only the bus decides when the wait ends
        let bus = FakeBus {
            open_id_failures: 25,
            ..Default::default()
        };
        let mut acq = Acquirer::new(bus, PollingWait::with_interval(Duration::ZERO));
        let dev = acq.acquire(&Target::new(0x15a2, 0x0080, None), true).unwrap();
        assert_eq!(dev, "15a2:0080");
        assert_eq!(acq.bus().open_id_calls, 26);
    }

    #[test]
    fn test_polling_without_wait_is_not_found() {
        let mut acq = Acquirer::new(FakeBus::default(), PollingWait::new());
        let err = acq
            .acquire(&Target::new(0x15a2, 0x0080, None), false)
            .unwrap_err();
        assert!(matches!(err, AcquireError::NotFound { .. }));
        assert_eq!(acq.bus().open_id_calls, 0);
    }
}
