//! macOS adapters: NSWorkspace activation notifications, running
//! applications, and Accessibility trust
//!
//! All Objective-C objects stay inside synchronous helpers so no `Retained`
//! value is ever held across an `.await`.

#![allow(unused_unsafe)]

use std::ptr::NonNull;

use async_trait::async_trait;
use block2::RcBlock;
use chrono::{DateTime, TimeZone, Utc};
use core_foundation::base::{CFTypeRef, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::CFDictionary;
use core_foundation::string::CFString;
use objc2::rc::Retained;
use objc2::runtime::{AnyObject, NSObjectProtocol, ProtocolObject};
use objc2_app_kit::{NSApplicationActivationPolicy, NSRunningApplication, NSWorkspace};
use objc2_foundation::{NSNotification, NSNotificationCenter, NSOperationQueue, NSString};
use timeguard_core::{
    ForegroundControl, ForegroundSubscription, PermissionProvider, ProcessControl, RunningProcess,
};
use timeguard_domain::{
    AppId, Capability, PermissionOutcome, PermissionState, Result, TimeguardError,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const ACTIVATION_NOTIFICATION: &str = "NSWorkspaceDidActivateApplicationNotification";
const FOREGROUND_BUFFER: usize = 64;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrustedWithOptions(options: CFTypeRef) -> bool;
}

type ObserverToken = Retained<ProtocolObject<dyn NSObjectProtocol>>;
type NotificationBlock = RcBlock<dyn Fn(NonNull<NSNotification>)>;

/// Foreground transitions from `NSWorkspaceDidActivateApplicationNotification`;
/// return-to-home hides the blocked application.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkspaceForegroundControl;

#[async_trait]
impl ForegroundControl for WorkspaceForegroundControl {
    async fn subscribe(&self) -> Result<ForegroundSubscription> {
        let (tx, rx) = mpsc::channel(FOREGROUND_BUFFER);
        let observer = ActivationObserver::register(tx);
        info!("NSWorkspace activation observer registered");
        Ok(ForegroundSubscription::new(rx, move || drop(observer)))
    }

    async fn return_to_home(&self, app: &AppId) -> Result<()> {
        match hide_application(app) {
            HideOutcome::Hidden | HideOutcome::NotRunning => Ok(()),
            HideOutcome::Refused => Err(TimeguardError::TransientPlatform(format!(
                "NSRunningApplication refused to hide {app}"
            ))),
        }
    }
}

/// Observer registration that is removed from the notification center on
/// drop, before the block and queue are released.
struct ActivationObserver {
    center: Retained<NSNotificationCenter>,
    token: Option<ObserverToken>,
    _block: NotificationBlock,
    _queue: Retained<NSOperationQueue>,
}

// SAFETY: the observer is only touched again in `Drop`, and
// NSNotificationCenter allows removing observers from any thread. The block
// captures an mpsc sender, which is Send + Sync.
unsafe impl Send for ActivationObserver {}

impl ActivationObserver {
    fn register(events: mpsc::Sender<AppId>) -> Self {
        let workspace = NSWorkspace::sharedWorkspace();
        let center = unsafe { workspace.notificationCenter() };

        let queue = unsafe { NSOperationQueue::new() };
        unsafe { queue.setMaxConcurrentOperationCount(1) };

        let block: NotificationBlock = RcBlock::new(move |_note: NonNull<NSNotification>| {
            let Some(app) = frontmost_app() else {
                return;
            };
            if events.try_send(app).is_err() {
                debug!("foreground event dropped; receiver busy or closed");
            }
        });

        let name = NSString::from_str(ACTIVATION_NOTIFICATION);
        // SAFETY: the block and queue are retained by `Self` for as long as
        // the registration exists.
        let token = unsafe {
            center.addObserverForName_object_queue_usingBlock(
                Some(&name),
                None,
                Some(&queue),
                &block,
            )
        };

        Self { center, token: Some(token), _block: block, _queue: queue }
    }
}

impl Drop for ActivationObserver {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            // SAFETY: ProtocolObject is a transparent wrapper over AnyObject,
            // and `token` was returned by this center's addObserverForName
            // call and has not been removed yet.
            unsafe {
                let observer = &*Retained::as_ptr(&token).cast::<AnyObject>();
                self.center.removeObserver(observer);
            }
            debug!("NSWorkspace activation observer removed");
        }
    }
}

fn frontmost_app() -> Option<AppId> {
    let workspace = NSWorkspace::sharedWorkspace();
    let app = workspace.frontmostApplication()?;
    let bundle = app.bundleIdentifier()?;
    Some(AppId::new(bundle.to_string()))
}

enum HideOutcome {
    Hidden,
    NotRunning,
    Refused,
}

/// Hide every running instance of `app`. Bundle ids are compared after
/// normalization since [`AppId`] is case-folded.
fn hide_application(app: &AppId) -> HideOutcome {
    let workspace = NSWorkspace::sharedWorkspace();
    let running_apps = workspace.runningApplications();
    let mut matched = false;
    let mut hidden = false;

    for running in running_apps.iter() {
        if bundle_app_id(&running).as_ref() != Some(app) {
            continue;
        }
        matched = true;
        hidden |= unsafe { running.hide() };
    }

    match (matched, hidden) {
        (false, _) => HideOutcome::NotRunning,
        (true, true) => HideOutcome::Hidden,
        (true, false) => HideOutcome::Refused,
    }
}

fn bundle_app_id(app: &NSRunningApplication) -> Option<AppId> {
    app.bundleIdentifier().map(|bundle| AppId::new(bundle.to_string()))
}

/// Regular (dock-visible) applications keyed by bundle id, so usage and
/// blocking agree on identities.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkspaceProcessTable;

#[async_trait]
impl ProcessControl for WorkspaceProcessTable {
    async fn running_processes(&self) -> Result<Vec<RunningProcess>> {
        Ok(regular_applications())
    }

    async fn terminate(&self, process: &RunningProcess) -> Result<()> {
        let pid = process.pid;
        let workspace = NSWorkspace::sharedWorkspace();
        let running_apps = workspace.runningApplications();
        let target = running_apps.iter().find(|running| {
            u32::try_from(running.processIdentifier()).ok() == Some(pid)
                && bundle_app_id(running).as_ref() == Some(&process.app)
        });

        match target {
            None => Ok(()),
            Some(running) if unsafe { running.terminate() } => Ok(()),
            Some(_) => Err(TimeguardError::Platform(format!(
                "NSRunningApplication refused to terminate {}",
                process.app
            ))),
        }
    }
}

fn regular_applications() -> Vec<RunningProcess> {
    let workspace = NSWorkspace::sharedWorkspace();
    let running_apps = workspace.runningApplications();
    running_apps
        .iter()
        .filter(|running| running.activationPolicy() == NSApplicationActivationPolicy::Regular)
        .filter_map(|running| {
            let app = bundle_app_id(&running)?;
            let pid = u32::try_from(running.processIdentifier()).ok()?;
            let name = running.localizedName().map_or_else(|| app.to_string(), |n| n.to_string());
            let started_at = unsafe { running.launchDate() }
                .and_then(|date| launch_instant(date.timeIntervalSince1970()));
            Some(RunningProcess { pid, app, name, started_at })
        })
        .collect()
}

fn launch_instant(epoch_secs: f64) -> Option<DateTime<Utc>> {
    if !epoch_secs.is_finite() || epoch_secs <= 0.0 {
        return None;
    }
    let secs = epoch_secs.trunc() as i64;
    Utc.timestamp_opt(secs, 0).single()
}

/// Permission provider backed by the Accessibility trust database.
///
/// Foreground notifications need no grant, so `UsageStatistics` is always
/// approved; blocking requires the process to be AX-trusted.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessibilityPermissionProvider;

#[async_trait]
impl PermissionProvider for AccessibilityPermissionProvider {
    async fn check(&self, capability: Capability) -> Result<PermissionState> {
        Ok(match capability {
            Capability::UsageStatistics => PermissionState::Approved,
            Capability::Accessibility if ax_trusted(false) => PermissionState::Approved,
            // The trust database does not distinguish "never asked" from "refused".
            Capability::Accessibility => PermissionState::NotDetermined,
            Capability::ScreenTimeAuthorization | Capability::ProcessControl => {
                PermissionState::Denied
            }
        })
    }

    async fn request(&self, capability: Capability) -> Result<PermissionOutcome> {
        match capability {
            Capability::UsageStatistics => Ok(PermissionOutcome::Granted),
            Capability::Accessibility => {
                if ax_trusted(true) {
                    Ok(PermissionOutcome::Granted)
                } else {
                    warn!("accessibility trust not granted; System Settings prompt shown");
                    Ok(PermissionOutcome::Denied)
                }
            }
            other => Err(TimeguardError::CapabilityUnavailable(format!(
                "{other} is not available on macOS"
            ))),
        }
    }
}

fn ax_trusted(prompt: bool) -> bool {
    let key = CFString::from_static_string("AXTrustedCheckOptionPrompt");
    let value = CFBoolean::from(prompt);
    let options = CFDictionary::from_CFType_pairs(&[(key.as_CFType(), value.as_CFType())]);

    // SAFETY: the options dictionary is a valid CFDictionary that outlives
    // the call; the function does not retain it.
    unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef().cast()) }
}
