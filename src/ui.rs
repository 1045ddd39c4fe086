use bevy::prelude::*;
use bevy::ui::BackgroundColor;

use crate::ar::core::Label;
use crate::ar::plugin::{ArPlacement, PlacementNotice, PlacementTick};
use crate::ar::surfaces::TrackingSnapshot;

const HINT: &str = "Enter: next step  |  1-3: slot  |  R: reset  |  Backspace: reset + stop spawns\n\
                    LMB: place / draw  |  RMB drag: look  |  WASD: walk";

/// Multi-line diagnostics block.
#[derive(Component)]
pub struct StatusText;

/// Last message from the placement core.
#[derive(Component)]
pub struct NoticeText;

impl Label for Text {
    fn set_text(&mut self, text: &str) {
        if self.0 != text {
            self.0 = text.to_string();
        }
    }
}

pub struct HudPlugin;

impl Plugin for HudPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_hud)
            .add_systems(Update, (update_status_text, update_notice_text).after(PlacementTick));
    }
}

pub fn spawn_hud(mut commands: Commands) {
    commands
        .spawn((
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(8.0),
                top: Val::Px(8.0),
                padding: UiRect::all(Val::Px(8.0)),
                flex_direction: FlexDirection::Column,
                row_gap: Val::Px(6.0),
                ..default()
            },
            BackgroundColor(Color::linear_rgba(0.0, 0.0, 0.0, 0.6)),
            // clicks on the panel are flagged as over-UI
            Interaction::default(),
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new("AR idle"),
                TextFont { font_size: 14.0, ..default() },
                TextColor(Color::WHITE),
                StatusText,
            ));
            parent.spawn((
                Text::new(""),
                TextFont { font_size: 14.0, ..default() },
                TextColor(Color::srgb(1.0, 0.85, 0.3)),
                NoticeText,
            ));
            parent.spawn((
                Text::new(HINT),
                TextFont { font_size: 12.0, ..default() },
                TextColor(Color::srgb(0.7, 0.7, 0.7)),
            ));
        });
}

pub fn update_status_text(
    placement: Option<Res<ArPlacement>>,
    snapshot: Res<TrackingSnapshot>,
    mut labels: Query<&mut Text, With<StatusText>>,
) {
    let Some(placement) = placement else { return; };
    let status = placement.status_snapshot(&*snapshot, &*snapshot).to_string();
    for mut text in &mut labels {
        text.set_text(&status);
    }
}

pub fn notice_line(notice: &PlacementNotice) -> Option<String> {
    match notice {
        PlacementNotice::Placed(tag) => Some(format!("{} placed", tag.label())),
        PlacementNotice::CalibrationComplete => Some("Calibration complete, place your entries".to_string()),
        PlacementNotice::Error(msg) => Some(format!("Error: {msg}")),
        // shown by the status block; would drown out everything else
        PlacementNotice::CalibrationProgress { .. } => None,
    }
}

pub fn update_notice_text(
    mut evr: EventReader<PlacementNotice>,
    mut labels: Query<&mut Text, With<NoticeText>>,
) {
    let Some(line) = evr.read().filter_map(notice_line).last() else { return; };
    for mut text in &mut labels {
        text.set_text(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ar::core::PlaceableType;

    #[test]
    fn text_label_replaces_content() {
        let mut text = Text::new("old");
        text.set_text("new");
        assert_eq!(text.0, "new");
    }

    #[test]
    fn notices_render_as_lines() {
        assert_eq!(notice_line(&PlacementNotice::Placed(PlaceableType::Hatch)).as_deref(), Some("Hatch placed"));
        assert_eq!(notice_line(&PlacementNotice::Error("no camera pose".into())).as_deref(), Some("Error: no camera pose"));
        assert!(notice_line(&PlacementNotice::CalibrationProgress { surfaces: 2, elapsed: 3.0 }).is_none());
    }
}
