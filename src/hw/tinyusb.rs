//! TinyUSB host stack bound through its C API.
//!
//! The C library is linked from `TINYUSB_LIB_DIR` (see `build.rs`). Its
//! callbacks fire from inside `tuh_task_ext`, i.e. on the poll loop's own
//! stack, and only copy what they were given into [`EVENTS`]. The bridge
//! then drains the queue through [`UsbHost::take_event`], so re-arming
//! and relaying never re-enter the stack from a callback.
//!
//! SET_REPORT and GET_REPORT keep a pointer to their data until the
//! transfer completes, so both go through the single [`XFER`] buffer. A
//! submission while another device owns it is refused and the scheduler
//! retries it on a later pass.

use core::cell::{Cell, RefCell, UnsafeCell};
use core::sync::atomic::{AtomicU8, Ordering};

use defmt::{debug, error, info, warn};
use embassy_rp::interrupt::{self, InterruptExt};
use embassy_rp::peripherals::USB;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{block_for, Duration, Instant};
use hid_relay::config::{HOST_EVENT_QUEUE_DEPTH, MAX_PAYLOAD_SIZE};
use hid_relay::protocol::{DeviceId, IntervalOverride};
use hid_relay::usb::{EventQueue, HostEvent, Payload, ReportType, UsbHost};

const RHPORT: u8 = 0;

/// Address 0 is only used during enumeration, never by a mounted device.
const FREE: u8 = 0;

extern "C" {
    fn tuh_init(rhport: u8) -> bool;
    fn tuh_task_ext(timeout_ms: u32, in_isr: bool);
    fn hcd_int_handler(rhport: u8, in_isr: bool);
    fn tuh_vid_pid_get(daddr: u8, vid: *mut u16, pid: *mut u16) -> bool;
    fn tuh_hid_receive_report(dev_addr: u8, idx: u8) -> bool;
    fn tuh_hid_set_report(
        dev_addr: u8,
        idx: u8,
        report_id: u8,
        report_type: u8,
        report: *mut u8,
        len: u16,
    ) -> bool;
    fn tuh_hid_get_report(
        dev_addr: u8,
        idx: u8,
        report_id: u8,
        report_type: u8,
        report: *mut u8,
        len: u16,
    ) -> bool;
}

/// Polling interval override read by the host stack when it opens an
/// interrupt endpoint. Zero keeps the descriptor's `bInterval`.
#[export_name = "interval_override"]
static INTERVAL_OVERRIDE: AtomicU8 = AtomicU8::new(0);

static EVENTS: Mutex<CriticalSectionRawMutex, RefCell<EventQueue<HOST_EVENT_QUEUE_DEPTH>>> =
    Mutex::new(RefCell::new(EventQueue::new()));

static XFER: TransferBuffer = TransferBuffer::new();

/// Control transfer data region with single-device ownership.
struct TransferBuffer {
    owner: Mutex<CriticalSectionRawMutex, Cell<u8>>,
    bytes: UnsafeCell<[u8; MAX_PAYLOAD_SIZE]>,
}

// SAFETY: `bytes` is only touched by the device recorded in `owner`, and
// ownership changes inside a critical section.
unsafe impl Sync for TransferBuffer {}

impl TransferBuffer {
    const fn new() -> Self {
        Self {
            owner: Mutex::new(Cell::new(FREE)),
            bytes: UnsafeCell::new([0; MAX_PAYLOAD_SIZE]),
        }
    }

    /// Take the buffer for `dev_addr`. Returns its data pointer.
    fn claim(&self, dev_addr: u8) -> Option<*mut u8> {
        let claimed = self.owner.lock(|owner| {
            if owner.get() != FREE {
                return false;
            }
            owner.set(dev_addr);
            true
        });
        claimed.then(|| self.bytes.get().cast::<u8>())
    }

    fn release(&self, dev_addr: u8) {
        self.owner.lock(|owner| {
            if owner.get() == dev_addr {
                owner.set(FREE);
            }
        });
    }

    /// SAFETY: caller must own the buffer.
    unsafe fn contents(&self, len: usize) -> &[u8] {
        let bytes = &*self.bytes.get();
        &bytes[..len.min(MAX_PAYLOAD_SIZE)]
    }
}

/// TinyUSB host on the RP2040 native USB port.
pub struct TinyUsbHost {
    _usb: USB,
}

impl TinyUsbHost {
    /// Claims the USB peripheral. The stack is started later by
    /// [`UsbHost::init`].
    pub fn new(usb: USB) -> Self {
        Self { _usb: usb }
    }

    fn set_report(
        &mut self,
        device: DeviceId,
        report_id: u8,
        kind: ReportType,
        report: &[u8],
    ) -> bool {
        if report.len() > MAX_PAYLOAD_SIZE {
            return false;
        }
        let Some(buf) = XFER.claim(device.dev_addr) else {
            return false;
        };
        // SAFETY: we own `XFER` until the completion callback releases it.
        unsafe {
            core::ptr::copy_nonoverlapping(report.as_ptr(), buf, report.len());
        }
        // SAFETY: `buf` stays valid for the lifetime of the transfer.
        let started = unsafe {
            tuh_hid_set_report(
                device.dev_addr,
                device.interface,
                report_id,
                kind as u8,
                buf,
                report.len() as u16,
            )
        };
        if !started {
            XFER.release(device.dev_addr);
        }
        started
    }
}

impl UsbHost for TinyUsbHost {
    fn init(&mut self, interval_override: IntervalOverride) {
        INTERVAL_OVERRIDE.store(interval_override.as_millis(), Ordering::Relaxed);
        // SAFETY: called once, before any other stack function.
        let ok = unsafe { tuh_init(RHPORT) };
        if !ok {
            warn!("tinyusb: tuh_init failed");
        }
        interrupt::USBCTRL_IRQ.unpend();
        // SAFETY: the handler below only forwards to the host controller
        // driver.
        unsafe { interrupt::USBCTRL_IRQ.enable() };
        info!(
            "tinyusb: host started, interval override {} ms",
            interval_override.as_millis()
        );
    }

    fn task(&mut self) {
        // SAFETY: never called from interrupt context. A zero timeout
        // returns as soon as the event queue is empty.
        unsafe { tuh_task_ext(0, false) };
    }

    fn take_event(&mut self) -> Option<HostEvent> {
        EVENTS.lock(|events| events.borrow_mut().pop())
    }

    fn vendor_product_id(&self, dev_addr: u8) -> Option<(u16, u16)> {
        let mut vid = 0u16;
        let mut pid = 0u16;
        // SAFETY: both out-pointers are valid for the call.
        unsafe { tuh_vid_pid_get(dev_addr, &mut vid, &mut pid) }.then_some((vid, pid))
    }

    fn receive_report(&mut self, device: DeviceId) -> bool {
        // SAFETY: plain request submission.
        unsafe { tuh_hid_receive_report(device.dev_addr, device.interface) }
    }

    fn send_output_report(&mut self, device: DeviceId, report_id: u8, report: &[u8]) -> bool {
        self.set_report(device, report_id, ReportType::Output, report)
    }

    fn set_feature_report(&mut self, device: DeviceId, report_id: u8, report: &[u8]) -> bool {
        self.set_report(device, report_id, ReportType::Feature, report)
    }

    fn get_feature_report(&mut self, device: DeviceId, report_id: u8, len: u16) -> bool {
        if usize::from(len) > MAX_PAYLOAD_SIZE {
            return false;
        }
        let Some(buf) = XFER.claim(device.dev_addr) else {
            return false;
        };
        // SAFETY: `buf` stays valid for the lifetime of the transfer.
        let started = unsafe {
            tuh_hid_get_report(
                device.dev_addr,
                device.interface,
                report_id,
                ReportType::Feature as u8,
                buf,
                len,
            )
        };
        if !started {
            XFER.release(device.dev_addr);
        }
        started
    }
}

fn post(event: HostEvent) {
    if EVENTS
        .lock(|events| events.borrow_mut().post(event))
        .is_err()
    {
        error!("tinyusb: event queue overrun, depth {}", HOST_EVENT_QUEUE_DEPTH);
    }
}

/// SAFETY: the stack guarantees `ptr` points at `len` readable bytes.
unsafe fn borrowed<'a>(ptr: *const u8, len: u16) -> &'a [u8] {
    if ptr.is_null() || len == 0 {
        return &[];
    }
    core::slice::from_raw_parts(ptr, usize::from(len))
}

#[no_mangle]
extern "C" fn tuh_hid_mount_cb(dev_addr: u8, idx: u8, desc_report: *const u8, desc_len: u16) {
    debug!("tinyusb: mount {}:{} ({} byte descriptor)", dev_addr, idx, desc_len);
    // SAFETY: descriptor buffer is valid for the duration of the callback.
    let descriptor = Payload::capture(unsafe { borrowed(desc_report, desc_len) });
    post(HostEvent::Mounted {
        device: DeviceId::new(dev_addr, idx),
        descriptor,
    });
}

#[no_mangle]
extern "C" fn tuh_hid_umount_cb(dev_addr: u8, idx: u8) {
    debug!("tinyusb: unmount {}:{}", dev_addr, idx);
    XFER.release(dev_addr);
    post(HostEvent::Unmounted {
        device: DeviceId::new(dev_addr, idx),
    });
}

#[no_mangle]
extern "C" fn tuh_hid_report_received_cb(dev_addr: u8, idx: u8, report: *const u8, len: u16) {
    // SAFETY: report buffer is valid for the duration of the callback.
    let report = Payload::capture(unsafe { borrowed(report, len) });
    post(HostEvent::ReportReceived {
        device: DeviceId::new(dev_addr, idx),
        report,
    });
}

#[no_mangle]
extern "C" fn tuh_hid_set_report_complete_cb(
    dev_addr: u8,
    idx: u8,
    report_id: u8,
    report_type: u8,
    _len: u16,
) {
    XFER.release(dev_addr);
    post(HostEvent::SetReportComplete {
        device: DeviceId::new(dev_addr, idx),
        report_id,
        report_type: ReportType::from_raw(report_type).unwrap_or(ReportType::Output),
    });
}

#[no_mangle]
extern "C" fn tuh_hid_get_report_complete_cb(
    dev_addr: u8,
    idx: u8,
    report_id: u8,
    _report_type: u8,
    len: u16,
) {
    // SAFETY: `dev_addr` still owns the buffer until the release below.
    let report = Payload::capture(unsafe { XFER.contents(usize::from(len)) });
    XFER.release(dev_addr);
    post(HostEvent::GetReportComplete {
        device: DeviceId::new(dev_addr, idx),
        report_id,
        report,
    });
}

#[no_mangle]
extern "C" fn tuh_sof_cb() {
    post(HostEvent::StartOfFrame);
}

#[no_mangle]
extern "C" fn tusb_time_millis_api() -> u32 {
    Instant::now().as_millis() as u32
}

#[no_mangle]
extern "C" fn tusb_time_delay_ms_api(ms: u32) {
    block_for(Duration::from_millis(u64::from(ms)));
}

#[allow(non_snake_case)]
#[no_mangle]
unsafe extern "C" fn USBCTRL_IRQ() {
    hcd_int_handler(RHPORT, true);
}
