// The try-on flow as an explicit state machine. Every transition carries its
// cleanup obligations as commands, so camera teardown is attached to the
// transition itself rather than to whichever view happens to be unmounting.
// Events that do not match the current step are ignored.

use crate::analytics::AnalyticsEvent;
use crate::types::{CapturedPhoto, PhotoSource, TryOnResult};

/// The user-visible steps plus the terminal `Closed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Loading,
    Product,
    Photo,
    Preview,
    Processing,
    Result,
    Closed,
}

/// Everything that can drive the machine: user actions, settled network
/// calls, and camera outcomes.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    /// Config and product fetch settled, successfully or not. A failed
    /// product load still lands on the product step with a visible message.
    SessionLoaded { error: Option<String> },
    /// Primary CTA on the product step.
    CaptureRequested,
    /// A frame was captured or an uploaded file finished reading.
    PhotoReady { photo: CapturedPhoto },
    /// Back navigation from the photo step.
    BackRequested,
    /// Camera acquisition failed; the machine stays on the photo step.
    CameraFailed { message: String },
    /// "Cancel" while the stream is live; stays on the photo step.
    CameraCancelled,
    /// "Retake" from the preview step.
    RetakeRequested,
    /// "Generate" from the preview step.
    GenerateRequested,
    GenerationSucceeded { result: TryOnResult },
    GenerationFailed { message: String },
    /// "Try Again" from the result step.
    TryAgainRequested,
    /// Close button or host-initiated destroy. Valid from every state.
    CloseRequested,
}

/// Effects the loader must run after a transition. Order matters: teardown
/// commands are emitted before `Teardown` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Render,
    StartCamera,
    StopCamera,
    SubmitGeneration,
    NotifyComplete,
    Track(AnalyticsEvent),
    Teardown,
}

/// Session-scoped state machine. Owns the captured photo and the generation
/// result for exactly as long as the flow needs them.
#[derive(Debug, Clone)]
pub struct TryOnStateMachine {
    step: Step,
    photo: Option<CapturedPhoto>,
    result: Option<TryOnResult>,
    error: Option<String>,
    generating: bool,
    preview: bool,
}

impl TryOnStateMachine {
    pub fn new() -> Self {
        Self::with_mode(false)
    }

    /// A preview machine shows the flow with a synthesized product and
    /// rejects photo acquisition, so dashboard embeds can never reach the
    /// camera or the generation endpoint.
    pub fn preview() -> Self {
        Self::with_mode(true)
    }

    fn with_mode(preview: bool) -> Self {
        TryOnStateMachine {
            step: Step::Loading,
            photo: None,
            result: None,
            error: None,
            generating: false,
            preview,
        }
    }

    pub fn is_preview(&self) -> bool {
        self.preview
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn photo(&self) -> Option<&CapturedPhoto> {
        self.photo.as_ref()
    }

    pub fn result(&self) -> Option<&TryOnResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    /// Apply one event and return the commands the caller must execute.
    /// Mismatched events return an empty list and leave the machine unchanged,
    /// which makes stale UI callbacks after a transition harmless.
    pub fn apply(&mut self, event: WidgetEvent) -> Vec<Command> {
        if self.step == Step::Closed {
            return Vec::new();
        }

        // Preview sessions never acquire a photo, by any source.
        if self.preview
            && matches!(
                event,
                WidgetEvent::CaptureRequested | WidgetEvent::PhotoReady { .. }
            )
        {
            return Vec::new();
        }

        // Close is the one transition allowed from every state; the stream is
        // force-stopped before teardown regardless of where we are.
        if event == WidgetEvent::CloseRequested {
            self.step = Step::Closed;
            return vec![
                Command::StopCamera,
                Command::Track(AnalyticsEvent::WidgetClosed),
                Command::Teardown,
            ];
        }

        match (self.step, event) {
            (Step::Loading, WidgetEvent::SessionLoaded { error }) => {
                self.step = Step::Product;
                self.error = error;
                vec![
                    Command::Track(AnalyticsEvent::ProductViewed),
                    Command::Render,
                ]
            }

            (Step::Product, WidgetEvent::CaptureRequested) => {
                self.step = Step::Photo;
                self.error = None;
                vec![
                    Command::Track(AnalyticsEvent::PhotoCaptureStarted),
                    Command::Render,
                    Command::StartCamera,
                ]
            }

            // Uploads are accepted from the product step directly (the upload
            // CTA lives there too) and from the photo step; camera captures
            // only from the photo step.
            (Step::Product, WidgetEvent::PhotoReady { photo })
                if photo.source() == PhotoSource::Upload =>
            {
                self.accept_photo(photo)
            }
            (Step::Photo, WidgetEvent::PhotoReady { photo }) => self.accept_photo(photo),

            (Step::Photo, WidgetEvent::BackRequested) => {
                self.step = Step::Product;
                self.error = None;
                vec![Command::StopCamera, Command::Render]
            }

            (Step::Photo, WidgetEvent::CameraFailed { message }) => {
                self.error = Some(message.clone());
                vec![
                    Command::Track(AnalyticsEvent::ErrorEvent),
                    Command::Render,
                ]
            }

            (Step::Photo, WidgetEvent::CameraCancelled) => {
                vec![Command::StopCamera, Command::Render]
            }

            (Step::Preview, WidgetEvent::RetakeRequested) => {
                self.step = Step::Photo;
                self.photo = None;
                self.error = None;
                vec![Command::Render, Command::StartCamera]
            }

            (Step::Preview, WidgetEvent::GenerateRequested) => {
                // Guard: one in-flight generation per session, and nothing to
                // submit without a photo.
                if self.generating || self.photo.is_none() {
                    return Vec::new();
                }
                self.step = Step::Processing;
                self.generating = true;
                self.error = None;
                vec![
                    Command::Track(AnalyticsEvent::TryonGenerationStarted),
                    Command::Render,
                    Command::SubmitGeneration,
                ]
            }

            (Step::Processing, WidgetEvent::GenerationSucceeded { result }) => {
                self.step = Step::Result;
                self.generating = false;
                self.result = Some(result);
                vec![
                    Command::Track(AnalyticsEvent::TryonGenerationSuccess),
                    Command::Render,
                    Command::NotifyComplete,
                ]
            }

            (Step::Processing, WidgetEvent::GenerationFailed { message }) => {
                // Back to preview, photo intact, so retry never recaptures.
                self.step = Step::Preview;
                self.generating = false;
                self.error = Some(message);
                vec![
                    Command::Track(AnalyticsEvent::TryonGenerationFailed),
                    Command::Render,
                ]
            }

            (Step::Result, WidgetEvent::TryAgainRequested) => {
                self.step = Step::Photo;
                self.photo = None;
                self.result = None;
                self.error = None;
                vec![
                    Command::Track(AnalyticsEvent::TryAgainClicked),
                    Command::Render,
                    Command::StartCamera,
                ]
            }

            _ => Vec::new(),
        }
    }

    fn accept_photo(&mut self, photo: CapturedPhoto) -> Vec<Command> {
        let track = match photo.source() {
            PhotoSource::Camera => AnalyticsEvent::PhotoCaptured,
            PhotoSource::Upload => AnalyticsEvent::PhotoUploaded,
        };
        self.step = Step::Preview;
        self.photo = Some(photo);
        self.error = None;
        vec![Command::StopCamera, Command::Track(track), Command::Render]
    }
}

impl Default for TryOnStateMachine {
    fn default() -> Self {
        TryOnStateMachine::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn camera_photo() -> CapturedPhoto {
        CapturedPhoto::new("data:image/jpeg;base64,AAAA", PhotoSource::Camera)
    }

    fn uploaded_photo() -> CapturedPhoto {
        CapturedPhoto::new("data:image/png;base64,BBBB", PhotoSource::Upload)
    }

    fn result_image() -> TryOnResult {
        TryOnResult {
            image: "data:image/png;base64,CCCC".to_string(),
            completed_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn machine_at_preview() -> TryOnStateMachine {
        let mut machine = TryOnStateMachine::new();
        machine.apply(WidgetEvent::SessionLoaded { error: None });
        machine.apply(WidgetEvent::CaptureRequested);
        machine.apply(WidgetEvent::PhotoReady {
            photo: camera_photo(),
        });
        assert_eq!(machine.step(), Step::Preview);
        machine
    }

    #[test]
    fn happy_path_reaches_result() {
        let mut machine = machine_at_preview();
        let commands = machine.apply(WidgetEvent::GenerateRequested);
        assert_eq!(machine.step(), Step::Processing);
        assert!(commands.contains(&Command::SubmitGeneration));

        let commands = machine.apply(WidgetEvent::GenerationSucceeded {
            result: result_image(),
        });
        assert_eq!(machine.step(), Step::Result);
        assert!(commands.contains(&Command::NotifyComplete));
        assert!(machine.result().is_some());
        assert!(!machine.is_generating());
    }

    #[test]
    fn leaving_photo_always_stops_the_camera() {
        // Via capture.
        let mut machine = TryOnStateMachine::new();
        machine.apply(WidgetEvent::SessionLoaded { error: None });
        machine.apply(WidgetEvent::CaptureRequested);
        let commands = machine.apply(WidgetEvent::PhotoReady {
            photo: camera_photo(),
        });
        assert!(commands.contains(&Command::StopCamera));

        // Via back navigation.
        let mut machine = TryOnStateMachine::new();
        machine.apply(WidgetEvent::SessionLoaded { error: None });
        machine.apply(WidgetEvent::CaptureRequested);
        let commands = machine.apply(WidgetEvent::BackRequested);
        assert!(commands.contains(&Command::StopCamera));
        assert_eq!(machine.step(), Step::Product);
    }

    #[test]
    fn close_from_every_step_stops_camera_before_teardown() {
        let reachable: Vec<TryOnStateMachine> = vec![
            TryOnStateMachine::new(),
            {
                let mut m = TryOnStateMachine::new();
                m.apply(WidgetEvent::SessionLoaded { error: None });
                m
            },
            {
                let mut m = TryOnStateMachine::new();
                m.apply(WidgetEvent::SessionLoaded { error: None });
                m.apply(WidgetEvent::CaptureRequested);
                m
            },
            machine_at_preview(),
            {
                let mut m = machine_at_preview();
                m.apply(WidgetEvent::GenerateRequested);
                m
            },
            {
                let mut m = machine_at_preview();
                m.apply(WidgetEvent::GenerateRequested);
                m.apply(WidgetEvent::GenerationSucceeded {
                    result: result_image(),
                });
                m
            },
        ];

        for mut machine in reachable {
            let commands = machine.apply(WidgetEvent::CloseRequested);
            assert_eq!(machine.step(), Step::Closed);
            let stop = commands
                .iter()
                .position(|c| *c == Command::StopCamera)
                .expect("close must stop the camera");
            let teardown = commands
                .iter()
                .position(|c| *c == Command::Teardown)
                .expect("close must tear down");
            assert!(stop < teardown, "stream stop must precede teardown");
        }
    }

    #[test]
    fn closed_is_terminal() {
        let mut machine = TryOnStateMachine::new();
        machine.apply(WidgetEvent::CloseRequested);
        assert!(machine.apply(WidgetEvent::CaptureRequested).is_empty());
        assert!(machine.apply(WidgetEvent::CloseRequested).is_empty());
        assert_eq!(machine.step(), Step::Closed);
    }

    #[test]
    fn generation_failure_returns_to_preview_with_photo_intact() {
        let mut machine = machine_at_preview();
        machine.apply(WidgetEvent::GenerateRequested);
        machine.apply(WidgetEvent::GenerationFailed {
            message: "Failed to generate virtual try-on image".to_string(),
        });
        assert_eq!(machine.step(), Step::Preview);
        assert!(machine.photo().is_some(), "retry must not require recapture");
        assert!(machine.error().is_some());
        assert!(!machine.is_generating());

        // And retry is possible immediately.
        let commands = machine.apply(WidgetEvent::GenerateRequested);
        assert!(commands.contains(&Command::SubmitGeneration));
    }

    #[test]
    fn concurrent_generation_is_rejected() {
        let mut machine = machine_at_preview();
        let first = machine.apply(WidgetEvent::GenerateRequested);
        assert!(first.contains(&Command::SubmitGeneration));
        // A second click while in flight is a silent no-op.
        let second = machine.apply(WidgetEvent::GenerateRequested);
        assert!(second.is_empty());
        assert_eq!(machine.step(), Step::Processing);
    }

    #[test]
    fn generate_without_photo_is_rejected() {
        let mut machine = TryOnStateMachine::new();
        machine.apply(WidgetEvent::SessionLoaded { error: None });
        machine.apply(WidgetEvent::CaptureRequested);
        machine.apply(WidgetEvent::PhotoReady {
            photo: camera_photo(),
        });
        machine.apply(WidgetEvent::RetakeRequested);
        assert_eq!(machine.step(), Step::Photo);
        // Simulate a stale generate click arriving after the retake.
        assert!(machine.apply(WidgetEvent::GenerateRequested).is_empty());
    }

    #[test]
    fn upload_accepted_from_product_step() {
        let mut machine = TryOnStateMachine::new();
        machine.apply(WidgetEvent::SessionLoaded { error: None });
        let commands = machine.apply(WidgetEvent::PhotoReady {
            photo: uploaded_photo(),
        });
        assert_eq!(machine.step(), Step::Preview);
        assert!(commands.contains(&Command::Track(AnalyticsEvent::PhotoUploaded)));
    }

    #[test]
    fn camera_capture_not_accepted_from_product_step() {
        let mut machine = TryOnStateMachine::new();
        machine.apply(WidgetEvent::SessionLoaded { error: None });
        assert!(machine
            .apply(WidgetEvent::PhotoReady {
                photo: camera_photo()
            })
            .is_empty());
        assert_eq!(machine.step(), Step::Product);
    }

    #[test]
    fn camera_failure_keeps_photo_step_and_surfaces_error() {
        let mut machine = TryOnStateMachine::new();
        machine.apply(WidgetEvent::SessionLoaded { error: None });
        machine.apply(WidgetEvent::CaptureRequested);
        let commands = machine.apply(WidgetEvent::CameraFailed {
            message: "Camera access was denied. You can upload a photo instead.".to_string(),
        });
        assert_eq!(machine.step(), Step::Photo);
        assert!(machine.error().is_some());
        assert!(commands.contains(&Command::Track(AnalyticsEvent::ErrorEvent)));

        // The upload fallback still works from here.
        machine.apply(WidgetEvent::PhotoReady {
            photo: uploaded_photo(),
        });
        assert_eq!(machine.step(), Step::Preview);
    }

    #[test]
    fn try_again_discards_photo_and_result() {
        let mut machine = machine_at_preview();
        machine.apply(WidgetEvent::GenerateRequested);
        machine.apply(WidgetEvent::GenerationSucceeded {
            result: result_image(),
        });
        let commands = machine.apply(WidgetEvent::TryAgainRequested);
        assert_eq!(machine.step(), Step::Photo);
        assert!(machine.photo().is_none());
        assert!(machine.result().is_none());
        assert!(commands.contains(&Command::StartCamera));
    }

    #[test]
    fn preview_machine_rejects_photo_acquisition() {
        let mut machine = TryOnStateMachine::preview();
        machine.apply(WidgetEvent::SessionLoaded { error: None });
        assert_eq!(machine.step(), Step::Product);

        assert!(machine.apply(WidgetEvent::CaptureRequested).is_empty());
        assert!(machine
            .apply(WidgetEvent::PhotoReady {
                photo: uploaded_photo()
            })
            .is_empty());
        assert_eq!(machine.step(), Step::Product);
        assert!(machine.photo().is_none());

        // Closing still works from a preview session.
        let commands = machine.apply(WidgetEvent::CloseRequested);
        assert!(commands.contains(&Command::Teardown));
        assert_eq!(machine.step(), Step::Closed);
    }

    #[test]
    fn failed_session_load_still_lands_on_product() {
        let mut machine = TryOnStateMachine::new();
        machine.apply(WidgetEvent::SessionLoaded {
            error: Some("Failed to load product details".to_string()),
        });
        assert_eq!(machine.step(), Step::Product);
        assert_eq!(machine.error(), Some("Failed to load product details"));
    }

    fn event_strategy() -> impl Strategy<Value = WidgetEvent> {
        prop_oneof![
            Just(WidgetEvent::SessionLoaded { error: None }),
            Just(WidgetEvent::CaptureRequested),
            Just(WidgetEvent::PhotoReady {
                photo: CapturedPhoto::new("data:,", PhotoSource::Camera)
            }),
            Just(WidgetEvent::PhotoReady {
                photo: CapturedPhoto::new("data:,", PhotoSource::Upload)
            }),
            Just(WidgetEvent::BackRequested),
            Just(WidgetEvent::CameraFailed {
                message: "err".to_string()
            }),
            Just(WidgetEvent::CameraCancelled),
            Just(WidgetEvent::RetakeRequested),
            Just(WidgetEvent::GenerateRequested),
            Just(WidgetEvent::GenerationSucceeded {
                result: TryOnResult {
                    image: "data:,".to_string(),
                    completed_at: "t".to_string()
                }
            }),
            Just(WidgetEvent::GenerationFailed {
                message: "err".to_string()
            }),
            Just(WidgetEvent::TryAgainRequested),
            Just(WidgetEvent::CloseRequested),
        ]
    }

    proptest! {
        /// Single-stream invariant over arbitrary event sequences: command
        /// streams never request a second camera start without a stop in
        /// between, and a closed machine emits nothing further.
        #[test]
        fn camera_starts_and_stops_alternate(events in proptest::collection::vec(event_strategy(), 1..64)) {
            let mut machine = TryOnStateMachine::new();
            let mut camera_requested = false;
            let mut closed = false;

            for event in events {
                let commands = machine.apply(event);
                if closed {
                    prop_assert!(commands.is_empty(), "closed machine must stay silent");
                }
                for command in &commands {
                    match command {
                        Command::StartCamera => {
                            prop_assert!(
                                !camera_requested,
                                "second StartCamera without an intervening StopCamera"
                            );
                            camera_requested = true;
                        }
                        Command::StopCamera => camera_requested = false,
                        Command::Teardown => closed = true,
                        _ => {}
                    }
                }
            }
        }

        /// Processing can only ever be left toward Result, Preview, or Closed,
        /// and the in-flight flag is cleared on every settled outcome.
        #[test]
        fn processing_settles_cleanly(events in proptest::collection::vec(event_strategy(), 1..64)) {
            let mut machine = TryOnStateMachine::new();
            let mut previous = machine.step();

            for event in events {
                machine.apply(event);
                let current = machine.step();
                if previous == Step::Processing && current != Step::Processing {
                    prop_assert!(matches!(current, Step::Result | Step::Preview | Step::Closed));
                    if current != Step::Closed {
                        prop_assert!(!machine.is_generating());
                    }
                }
                previous = current;
            }
        }
    }
}
