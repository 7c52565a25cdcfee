//! Track assignment: the pivot rule and staged-rollout policy
//!
//! Google Play tracks are updated by whole-set replacement, so assignment is
//! split in two:
//!
//! - [`plan_assignment`] is pure. From the current tracks and an
//!   [`AssignmentRequest`] it computes every track update, in order, and the
//!   notices the user should see. A rejected rollout reduction fails here,
//!   before anything is written.
//! - [`TrackAssignmentEngine`] reads the tracks through the edit, plans, and
//!   applies the plan. The backend's response to the final update is what the
//!   task reports.
//!
//! # Update order
//!
//! ```text
//! production target: evict beta < pivot
//!                    clear rollout (if it has members)
//! any target:        evict alpha < pivot
//!                    assign (production, rollout, beta or alpha)
//! ```
//!
//! Evictions that would leave a track unchanged are not sent, and neither is
//! an eviction of the track that the final assignment replaces anyway.

use crate::core::api::TrackState;
use crate::core::edit::EditSession;
use crate::core::error::{PublishError, PublishResult};
use crate::core::plan::PlanId;
use crate::core::report::TaskReport;
use crate::core::track::{ReleaseTrack, RolloutFraction, format_fraction};
use serde::Serialize;
use std::collections::BTreeSet;

/// How far below the assigned versions older APKs are evicted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
  /// Fresh uploads: evict versions older than the lowest uploaded one
  UploadDriven,
  /// Moving existing versions: evict everything up to the highest moved one
  DirectAssignment,
}

impl EvictionPolicy {
  /// Version codes strictly below the pivot are evicted; `None` for no versions
  pub fn pivot(self, versions: &BTreeSet<u32>) -> Option<u32> {
    match self {
      EvictionPolicy::UploadDriven => versions.first().copied(),
      EvictionPolicy::DirectAssignment => versions.last().map(|max| max.saturating_add(1)),
    }
  }
}

/// What to do when the requested rollout is below the one already running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionPolicy {
  /// Keep the running, higher fraction and say so
  Clamp,
  /// Fail without writing anything
  Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentRequest {
  pub target: ReleaseTrack,
  pub version_codes: BTreeSet<u32>,
  pub rollout: RolloutFraction,
  pub eviction: EvictionPolicy,
  pub reduction: ReductionPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStep {
  EvictBeta,
  ClearRollout,
  EvictAlpha,
  Assign,
}

/// One whole-set track replacement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackUpdate {
  pub step: UpdateStep,
  pub state: TrackState,
}

impl TrackUpdate {
  pub fn describe(&self) -> String {
    match self.step {
      UpdateStep::EvictBeta | UpdateStep::EvictAlpha => format!(
        "- Removing older APK(s) from the {} track, leaving: {}",
        self.state.track,
        list_or_none(&self.state.version_codes)
      ),
      UpdateStep::ClearRollout => "- Clearing the existing staged rollout".to_string(),
      UpdateStep::Assign => match self.state.user_fraction {
        Some(fraction) => format!(
          "- Assigning APK(s) {} to the {} track at {}%",
          list_or_none(&self.state.version_codes),
          self.state.track,
          format_fraction(fraction)
        ),
        None => format!(
          "- Assigning APK(s) {} to the {} track",
          list_or_none(&self.state.version_codes),
          self.state.track
        ),
      },
    }
  }
}

/// Every update an assignment will send, in order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentPlan {
  pub target: ReleaseTrack,
  pub pivot: u32,
  pub updates: Vec<TrackUpdate>,
  pub notes: Vec<String>,
}

impl AssignmentPlan {
  pub fn id(&self) -> PublishResult<PlanId> {
    PlanId::of(self)
  }

  /// The assignment itself; always the last update
  pub fn final_state(&self) -> Option<&TrackState> {
    self
      .updates
      .last()
      .filter(|u| u.step == UpdateStep::Assign)
      .map(|u| &u.state)
  }

  /// The state every touched track ends up in, in first-touched order
  pub fn final_tracks(&self) -> Vec<TrackState> {
    let mut tracks: Vec<TrackState> = Vec::new();
    for update in &self.updates {
      match tracks.iter_mut().find(|t| t.track == update.state.track) {
        Some(existing) => *existing = update.state.clone(),
        None => tracks.push(update.state.clone()),
      }
    }
    tracks
  }
}

/// Compute the track updates for `request` against `current` tracks
pub fn plan_assignment(current: &[TrackState], request: &AssignmentRequest) -> PublishResult<AssignmentPlan> {
  let pivot = request
    .eviction
    .pivot(&request.version_codes)
    .ok_or_else(|| PublishError::message("No version codes were given to assign"))?;
  let find = |name: &str| current.iter().find(|t| t.track == name);

  let mut updates = Vec::new();
  let mut notes = Vec::new();
  let mut target_track = request.target.api_value();
  let mut user_fraction = None;

  if request.target == ReleaseTrack::Production {
    if let Some(beta) = find("beta") {
      push_eviction(&mut updates, UpdateStep::EvictBeta, beta, pivot);
    }

    let mut baseline = None;
    if let Some(rollout) = find("rollout")
      && !rollout.version_codes.is_empty()
    {
      baseline = rollout.user_fraction;
      // Google Play refuses production or rollout updates while the old rollout is live
      updates.push(TrackUpdate {
        step: UpdateStep::ClearRollout,
        state: TrackState::new("rollout", Vec::new()),
      });
    }

    if !request.rollout.is_full() {
      target_track = ReleaseTrack::Rollout.api_value();
      let mut applied = request.rollout.value();
      if let Some(current) = baseline
        && current > applied
      {
        match request.reduction {
          ReductionPolicy::Clamp => {
            notes.push(format!(
              "Staged rollout percentage will remain at {}% rather than the configured {}% because there were APK(s) already in a staged rollout, and Google Play makes it impossible to reduce the rollout percentage in this case",
              format_fraction(current),
              format_fraction(applied)
            ));
            applied = current;
          }
          ReductionPolicy::Reject => {
            return Err(PublishError::RolloutPercentageReduction {
              current,
              requested: applied,
            });
          }
        }
      }
      user_fraction = Some(applied);
    }
  } else if !request.rollout.is_full() {
    notes.push("Ignoring staged rollout percentage as it only applies to production releases".to_string());
  }

  if request.target != ReleaseTrack::Alpha
    && let Some(alpha) = find("alpha")
  {
    push_eviction(&mut updates, UpdateStep::EvictAlpha, alpha, pivot);
  }

  updates.push(TrackUpdate {
    step: UpdateStep::Assign,
    state: TrackState {
      track: target_track.to_string(),
      version_codes: request.version_codes.iter().copied().collect(),
      user_fraction,
    },
  });

  Ok(AssignmentPlan {
    target: request.target,
    pivot,
    updates,
    notes,
  })
}

fn push_eviction(updates: &mut Vec<TrackUpdate>, step: UpdateStep, track: &TrackState, pivot: u32) {
  let retained: Vec<u32> = track.version_codes.iter().copied().filter(|vc| *vc >= pivot).collect();
  if retained.len() == track.version_codes.len() {
    return;
  }
  updates.push(TrackUpdate {
    step,
    state: TrackState {
      track: track.track.clone(),
      version_codes: retained,
      user_fraction: track.user_fraction,
    },
  });
}

fn list_or_none(codes: &[u32]) -> String {
  if codes.is_empty() {
    "none".to_string()
  } else {
    codes.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ")
  }
}

/// Plans and applies assignments inside an open edit
pub struct TrackAssignmentEngine<'s, 'a> {
  session: &'s EditSession<'a>,
}

impl<'s, 'a> TrackAssignmentEngine<'s, 'a> {
  pub fn new(session: &'s EditSession<'a>) -> Self {
    Self { session }
  }

  /// Read the current tracks and plan against them
  pub fn plan(&self, request: &AssignmentRequest) -> PublishResult<AssignmentPlan> {
    let current = self.session.list_tracks()?;
    plan_assignment(&current, request)
  }

  /// Send every update in order; returns the backend's view of the final track
  ///
  /// A failure after at least one update leaves the edit partially changed and
  /// is reported as `PartialAssignment`. Nothing is rolled back; the edit is
  /// simply never committed.
  pub fn apply(&self, plan: &AssignmentPlan, report: &mut TaskReport) -> PublishResult<TrackState> {
    let mut completed = Vec::new();
    let mut last = None;

    for update in &plan.updates {
      let description = update.describe();
      report.line(description.clone());
      match self.session.update_track(&update.state) {
        Ok(state) => {
          completed.push(description);
          last = Some(state);
        }
        Err(err) if completed.is_empty() || matches!(err, PublishError::Interrupted) => return Err(err),
        Err(err) => {
          return Err(PublishError::PartialAssignment {
            completed,
            source: Box::new(err),
          });
        }
      }
    }

    let final_state = last.ok_or_else(|| PublishError::message("Assignment plan contained no track updates"))?;
    report.blank();
    report.line(format!(
      "The {} release track will now contain the APK(s): {}",
      final_state.track,
      list_or_none(&final_state.version_codes)
    ));
    Ok(final_state)
  }

  /// Plan, report notices, and apply
  pub fn assign(&self, request: &AssignmentRequest, report: &mut TaskReport) -> PublishResult<(AssignmentPlan, TrackState)> {
    let plan = self.plan(request)?;
    for note in &plan.notes {
      report.note(note.clone());
    }
    let final_state = self.apply(&plan, report)?;
    Ok((plan, final_state))
  }
}
