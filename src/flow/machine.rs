//! The four-screen flow as an explicit state machine.
//!
//! `Session::apply` is the only way to change the screen. It is synchronous and
//! free of I/O: persistence, capture and the model call happen around it.

use serde::Serialize;

use crate::analysis::dto::AnalysisResult;
use crate::capture::payload::ImagePayload;
use crate::profile::dto::UserProfile;

/// Shown when the camera cannot be used and the user should upload a file.
pub const CAMERA_UNAVAILABLE_NOTICE: &str =
    "تعذر الوصول للكاميرا. يرجى التأكد من السماح بالصلاحيات أو رفع صورة من الجهاز.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    Onboarding,
    Camera,
    Loading,
    Analysis,
}

#[derive(Debug, Clone)]
pub enum Event {
    ProfileSubmitted(UserProfile),
    CaptureStarted(ImagePayload),
    AnalysisSucceeded(AnalysisResult),
    AnalysisFailed(String),
    CameraFailed(String),
    Retake,
    ResetConfirmed,
    ResetDeclined,
}

/// Payload-free tag of an [`Event`], used to look up the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ProfileSubmitted,
    CaptureStarted,
    AnalysisSucceeded,
    AnalysisFailed,
    CameraFailed,
    Retake,
    ResetConfirmed,
    ResetDeclined,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::ProfileSubmitted => "profile_submitted",
            EventKind::CaptureStarted => "capture_started",
            EventKind::AnalysisSucceeded => "analysis_succeeded",
            EventKind::AnalysisFailed => "analysis_failed",
            EventKind::CameraFailed => "camera_failed",
            EventKind::Retake => "retake",
            EventKind::ResetConfirmed => "reset_confirmed",
            EventKind::ResetDeclined => "reset_declined",
        }
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ProfileSubmitted(_) => EventKind::ProfileSubmitted,
            Event::CaptureStarted(_) => EventKind::CaptureStarted,
            Event::AnalysisSucceeded(_) => EventKind::AnalysisSucceeded,
            Event::AnalysisFailed(_) => EventKind::AnalysisFailed,
            Event::CameraFailed(_) => EventKind::CameraFailed,
            Event::Retake => EventKind::Retake,
            Event::ResetConfirmed => EventKind::ResetConfirmed,
            Event::ResetDeclined => EventKind::ResetDeclined,
        }
    }
}

/// (from, event, to). Any pair not listed is rejected.
const TRANSITIONS: &[(Screen, EventKind, Screen)] = &[
    (Screen::Onboarding, EventKind::ProfileSubmitted, Screen::Camera),
    (Screen::Camera, EventKind::CaptureStarted, Screen::Loading),
    (Screen::Camera, EventKind::CameraFailed, Screen::Camera),
    (Screen::Camera, EventKind::ResetConfirmed, Screen::Onboarding),
    (Screen::Camera, EventKind::ResetDeclined, Screen::Camera),
    (Screen::Loading, EventKind::AnalysisSucceeded, Screen::Analysis),
    (Screen::Loading, EventKind::AnalysisFailed, Screen::Camera),
    (Screen::Analysis, EventKind::Retake, Screen::Camera),
];

pub fn next_screen(from: Screen, event: EventKind) -> Result<Screen, FlowError> {
    TRANSITIONS
        .iter()
        .find(|(f, e, _)| *f == from && *e == event)
        .map(|(_, _, to)| *to)
        .ok_or_else(|| match (from, event) {
            (Screen::Loading, EventKind::CaptureStarted) => FlowError::Busy,
            _ => FlowError::InvalidTransition {
                from,
                event: event.name(),
            },
        })
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FlowError {
    #[error("an analysis is already in progress")]
    Busy,
    #[error("{event} is not allowed on the {from:?} screen")]
    InvalidTransition { from: Screen, event: &'static str },
}

#[derive(Debug, Clone)]
pub struct Session {
    screen: Screen,
    profile: Option<UserProfile>,
    image: Option<ImagePayload>,
    result: Option<AnalysisResult>,
    notice: Option<String>,
}

/// What a client needs to render the current screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub screen: Screen,
    pub profile: Option<UserProfile>,
    /// Data URL of the retained capture.
    pub image: Option<String>,
    pub result: Option<AnalysisResult>,
    pub notice: Option<String>,
}

impl Session {
    /// Skips onboarding when a stored profile exists.
    pub fn start(profile: Option<UserProfile>) -> Self {
        let screen = if profile.is_some() {
            Screen::Camera
        } else {
            Screen::Onboarding
        };
        Self {
            screen,
            profile,
            image: None,
            result: None,
            notice: None,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn image(&self) -> Option<&ImagePayload> {
        self.image.as_ref()
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Dry run: would `event` be accepted on the current screen?
    pub fn check(&self, event: EventKind) -> Result<Screen, FlowError> {
        next_screen(self.screen, event)
    }

    /// Applies one event. On error the session is left exactly as it was.
    pub fn apply(&mut self, event: Event) -> Result<Screen, FlowError> {
        let next = self.check(event.kind())?;
        match event {
            Event::ProfileSubmitted(p) => {
                self.profile = Some(p);
                self.notice = None;
            }
            Event::CaptureStarted(img) => {
                self.image = Some(img);
                self.result = None;
                self.notice = None;
            }
            Event::AnalysisSucceeded(r) => self.result = Some(r),
            Event::AnalysisFailed(msg) => {
                self.image = None;
                self.result = None;
                self.notice = Some(msg);
            }
            Event::CameraFailed(msg) => self.notice = Some(msg),
            Event::Retake => {
                self.image = None;
                self.result = None;
                self.notice = None;
            }
            Event::ResetConfirmed => {
                self.profile = None;
                self.image = None;
                self.result = None;
                self.notice = None;
            }
            Event::ResetDeclined => {}
        }
        self.screen = next;
        Ok(next)
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            screen: self.screen,
            profile: self.profile.clone(),
            image: self.image.as_ref().map(ImagePayload::to_data_url),
            result: self.result.clone(),
            notice: self.notice.clone(),
        }
    }
}

#[cfg(test)]
mod machine_tests {
    use super::*;
    use crate::analysis::dto::Macros;

    fn sara() -> UserProfile {
        UserProfile {
            name: "Sara".into(),
            weight: 60.0,
            height: 165.0,
            age: 30.0,
        }
    }

    fn salad() -> AnalysisResult {
        AnalysisResult {
            food_name: "سلطة خضار".into(),
            calories: 180.0,
            macros: Macros {
                protein: "5g".into(),
                carbs: "20g".into(),
                fats: "8g".into(),
            },
            advice: "...".into(),
        }
    }

    fn jpeg() -> ImagePayload {
        ImagePayload::from_bytes(b"frame", "image/jpeg")
    }

    #[test]
    fn starts_on_onboarding_without_profile() {
        assert_eq!(Session::start(None).screen(), Screen::Onboarding);
    }

    #[test]
    fn starts_on_camera_with_stored_profile() {
        let s = Session::start(Some(sara()));
        assert_eq!(s.screen(), Screen::Camera);
        assert_eq!(s.profile(), Some(&sara()));
    }

    #[test]
    fn full_happy_path_then_retake() {
        let mut s = Session::start(None);
        assert_eq!(s.apply(Event::ProfileSubmitted(sara())), Ok(Screen::Camera));

        let img = jpeg();
        assert_eq!(s.apply(Event::CaptureStarted(img.clone())), Ok(Screen::Loading));
        assert_eq!(s.image(), Some(&img));

        assert_eq!(s.apply(Event::AnalysisSucceeded(salad())), Ok(Screen::Analysis));
        assert_eq!(s.result().map(|r| r.calories), Some(180.0));
        assert_eq!(s.image(), Some(&img));

        assert_eq!(s.apply(Event::Retake), Ok(Screen::Camera));
        assert!(s.image().is_none());
        assert!(s.result().is_none());
        assert_eq!(s.profile(), Some(&sara()));
    }

    #[test]
    fn failed_analysis_discards_image_and_sets_notice() {
        let mut s = Session::start(Some(sara()));
        s.apply(Event::CaptureStarted(jpeg())).unwrap();
        assert_eq!(s.apply(Event::AnalysisFailed("oops".into())), Ok(Screen::Camera));
        assert!(s.image().is_none());
        assert!(s.result().is_none());
        assert_eq!(s.notice(), Some("oops"));
    }

    #[test]
    fn second_capture_while_loading_is_busy() {
        let mut s = Session::start(Some(sara()));
        let first = jpeg();
        s.apply(Event::CaptureStarted(first.clone())).unwrap();
        assert_eq!(s.apply(Event::CaptureStarted(jpeg())), Err(FlowError::Busy));
        assert_eq!(s.image(), Some(&first));
        assert_eq!(s.screen(), Screen::Loading);
    }

    #[test]
    fn check_is_a_dry_run() {
        assert!(Session::start(None).check(EventKind::CaptureStarted).is_err());
        let mut s = Session::start(Some(sara()));
        assert_eq!(s.check(EventKind::CaptureStarted), Ok(Screen::Loading));
        assert_eq!(s.screen(), Screen::Camera);
        s.apply(Event::CaptureStarted(jpeg())).unwrap();
        assert_eq!(s.check(EventKind::CaptureStarted), Err(FlowError::Busy));
    }

    #[test]
    fn every_table_row_is_reachable_from_its_source() {
        for (from, event, to) in TRANSITIONS {
            assert_eq!(next_screen(*from, *event), Ok(*to));
        }
        assert!(next_screen(Screen::Analysis, EventKind::ResetConfirmed).is_err());
        assert!(next_screen(Screen::Loading, EventKind::Retake).is_err());
    }

    #[test]
    fn reset_confirmed_clears_profile() {
        let mut s = Session::start(Some(sara()));
        assert_eq!(s.apply(Event::ResetConfirmed), Ok(Screen::Onboarding));
        assert!(s.profile().is_none());
    }

    #[test]
    fn reset_declined_changes_nothing() {
        let mut s = Session::start(Some(sara()));
        s.apply(Event::CameraFailed("no cam".into())).unwrap();
        assert_eq!(s.apply(Event::ResetDeclined), Ok(Screen::Camera));
        assert_eq!(s.profile(), Some(&sara()));
        assert_eq!(s.notice(), Some("no cam"));
    }

    #[test]
    fn camera_failure_keeps_user_on_camera_with_notice() {
        let mut s = Session::start(Some(sara()));
        assert_eq!(
            s.apply(Event::CameraFailed(CAMERA_UNAVAILABLE_NOTICE.into())),
            Ok(Screen::Camera)
        );
        assert_eq!(s.notice(), Some(CAMERA_UNAVAILABLE_NOTICE));
        // The next capture clears the notice.
        s.apply(Event::CaptureStarted(jpeg())).unwrap();
        assert!(s.notice().is_none());
    }

    #[test]
    fn invalid_pairs_leave_session_untouched() {
        let mut s = Session::start(None);
        assert_eq!(
            s.apply(Event::CaptureStarted(jpeg())),
            Err(FlowError::InvalidTransition {
                from: Screen::Onboarding,
                event: "capture_started"
            })
        );
        assert!(s.image().is_none());
        assert!(s.apply(Event::Retake).is_err());
        assert!(s.apply(Event::ResetConfirmed).is_err());

        let mut s = Session::start(Some(sara()));
        assert!(s.apply(Event::ProfileSubmitted(sara())).is_err());
        assert!(s.apply(Event::AnalysisSucceeded(salad())).is_err());
        assert_eq!(s.screen(), Screen::Camera);
    }

    #[test]
    fn view_exposes_image_as_data_url() {
        let mut s = Session::start(Some(sara()));
        let img = jpeg();
        s.apply(Event::CaptureStarted(img.clone())).unwrap();
        let view = s.view();
        assert_eq!(view.screen, Screen::Loading);
        assert_eq!(view.image, Some(img.to_data_url()));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["screen"], "loading");
    }
}
