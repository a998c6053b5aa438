use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use parking_lot::Mutex;
use peerpad_audio::{
    AudioContext, AudioContextFactory, AudioError, AudioHook, AudioRouter, AudioSink,
    ContextState, Tone,
};

#[derive(Default)]
struct FakeSink {
    samples: Mutex<Vec<f32>>,
}

impl AudioSink for FakeSink {
    fn write(&self, samples: &[f32]) {
        self.samples.lock().extend_from_slice(samples);
    }
}

struct FakeContext {
    sink: Arc<FakeSink>,
    suspended: AtomicBool,
    refuse_resume: bool,
    resume_calls: AtomicUsize,
}

impl AudioContext for FakeContext {
    fn state(&self) -> ContextState {
        if self.suspended.load(Ordering::SeqCst) {
            ContextState::Suspended
        } else {
            ContextState::Running
        }
    }

    fn resume(&self) -> Result<(), AudioError> {
        self.resume_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_resume {
            return Err(AudioError::ResumeRefused("no user gesture".into()));
        }
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        8_000
    }

    fn destination(&self) -> Arc<dyn AudioSink> {
        self.sink.clone()
    }
}

/// Stands in for the platform's real context constructor.
#[derive(Default)]
struct FakeFactory {
    created: Mutex<Vec<Arc<FakeContext>>>,
    start_suspended: AtomicBool,
    refuse_resume: AtomicBool,
}

impl AudioContextFactory for FakeFactory {
    fn create(&self) -> Result<Arc<dyn AudioContext>, AudioError> {
        let ctx = Arc::new(FakeContext {
            sink: Arc::new(FakeSink::default()),
            suspended: AtomicBool::new(self.start_suspended.load(Ordering::SeqCst)),
            refuse_resume: self.refuse_resume.load(Ordering::SeqCst),
            resume_calls: AtomicUsize::new(0),
        });
        self.created.lock().push(ctx.clone());
        Ok(ctx)
    }
}

fn setup() -> (Arc<FakeFactory>, Arc<AudioHook>, AudioRouter) {
    let real = Arc::new(FakeFactory::default());
    let hook = Arc::new(AudioHook::new(real.clone()));
    let router = AudioRouter::new(hook.clone());
    (real, hook, router)
}

#[test]
fn volume_is_clamped() {
    let (_real, _hook, router) = setup();
    assert_eq!(router.set_volume(1.5), 1.0);
    assert_eq!(router.volume(), 1.0);
    assert_eq!(router.set_volume(-1.0), 0.0);
    assert_eq!(router.volume(), 0.0);
}

#[test]
fn set_volume_updates_every_registered_context() {
    let (_real, hook, router) = setup();
    let contexts: Vec<_> = (0..3).map(|_| hook.create().unwrap()).collect();
    assert_eq!(router.stage().len(), 3);

    router.set_volume(0.3);

    let gains: Vec<f32> = router.stage().gain_nodes().iter().map(|g| g.gain()).collect();
    assert_eq!(gains, vec![0.3, 0.3, 0.3]);
    drop(contexts);
}

#[test]
fn output_of_intercepted_context_goes_through_gain() {
    let (real, hook, router) = setup();
    router.set_volume(0.5);

    // The emulator core asks "where do I connect" and gets the gain node.
    let ctx = hook.create().unwrap();
    ctx.destination().write(&[1.0, 0.5]);

    let created = real.created.lock();
    assert_eq!(*created[0].sink.samples.lock(), vec![0.5, 0.25]);
}

#[test]
fn contexts_created_later_start_at_current_volume() {
    let (_real, hook, router) = setup();
    router.set_volume(0.2);
    let _ctx = hook.create().unwrap();
    assert_eq!(router.stage().gain_nodes()[0].gain(), 0.2);
}

#[test]
fn second_install_is_a_no_op_sharing_the_stage() {
    let (_real, hook, first) = setup();
    let second = AudioRouter::new(hook.clone());
    assert!(Arc::ptr_eq(first.stage(), second.stage()));

    let _ctx = hook.create().unwrap();
    second.set_volume(0.7);
    assert_eq!(first.volume(), 0.7);
    assert_eq!(first.stage().len(), 1);
}

#[test]
fn uninstalled_hook_passes_contexts_through() {
    let (real, hook, router) = setup();
    assert!(hook.uninstall());
    assert!(!hook.is_installed());

    let ctx = hook.create().unwrap();
    router.set_volume(0.0);
    ctx.destination().write(&[0.8]);
    assert_eq!(*real.created.lock()[0].sink.samples.lock(), vec![0.8]);
    assert!(router.stage().is_empty());
}

#[test]
fn set_volume_resumes_suspended_contexts() {
    let (real, hook, router) = setup();
    real.start_suspended.store(true, Ordering::SeqCst);
    let ctx = hook.create().unwrap();
    assert_eq!(ctx.state(), ContextState::Suspended);

    router.set_volume(0.4);
    assert_eq!(ctx.state(), ContextState::Running);
}

#[test]
fn resume_failures_are_not_fatal() {
    let (real, hook, router) = setup();
    real.start_suspended.store(true, Ordering::SeqCst);
    real.refuse_resume.store(true, Ordering::SeqCst);
    let _stubborn = hook.create().unwrap();
    real.refuse_resume.store(false, Ordering::SeqCst);
    let _willing = hook.create().unwrap();

    assert_eq!(router.resume(), 1);
    let created = real.created.lock();
    assert_eq!(created[0].resume_calls.load(Ordering::SeqCst), 1);
    assert_eq!(created[0].state(), ContextState::Suspended);
    assert_eq!(created[1].state(), ContextState::Running);
}

#[test]
fn ui_context_is_routed_like_any_other() {
    let (real, _hook, router) = setup();
    let ui = router.ui_context().unwrap();
    let again = router.ui_context().unwrap();
    assert!(Arc::ptr_eq(&ui, &again));
    assert_eq!(router.stage().len(), 1);

    router.set_volume(0.0);
    router.play_tone(&Tone::beep()).unwrap();
    let created = real.created.lock();
    let samples = created[0].sink.samples.lock();
    assert!(!samples.is_empty());
    assert!(samples.iter().all(|s| *s == 0.0));
}

#[test]
fn dropped_contexts_leave_the_stage() {
    let (_real, hook, router) = setup();
    let ctx = hook.create().unwrap();
    assert_eq!(router.stage().len(), 1);
    drop(ctx);
    assert!(router.stage().is_empty());
}

#[test]
fn contexts_created_during_volume_changes_end_at_the_last_volume() {
    let (_real, hook, router) = setup();
    let router = Arc::new(router);

    let creator = {
        let hook = hook.clone();
        std::thread::spawn(move || {
            (0..200)
                .map(|_| hook.create().unwrap())
                .collect::<Vec<_>>()
        })
    };
    let changer = {
        let router = router.clone();
        std::thread::spawn(move || {
            for i in 0..200 {
                router.set_volume(if i % 2 == 0 { 0.25 } else { 0.75 });
            }
        })
    };
    changer.join().unwrap();
    let contexts = creator.join().unwrap();

    let volume = router.volume();
    assert_eq!(volume, 0.75);
    assert_eq!(router.stage().len(), contexts.len());
    assert!(
        router
            .stage()
            .gain_nodes()
            .iter()
            .all(|g| g.gain() == volume)
    );
}
