// crates/jobs/src/catalog.rs
//! Fixed catalogues: generation agents and build target platforms.

use serde::{Deserialize, Serialize};

use crate::error::{JobError, Result};

/// A generation agent the AI endpoint can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Agent {
    Code,
    Art2d,
    Art3d,
    Audio,
    Shader,
    Level,
    Ui,
    Lighting,
    Physics,
    Cutscene,
}

impl Agent {
    pub const ALL: [Agent; 10] = [
        Agent::Code,
        Agent::Art2d,
        Agent::Art3d,
        Agent::Audio,
        Agent::Shader,
        Agent::Level,
        Agent::Ui,
        Agent::Lighting,
        Agent::Physics,
        Agent::Cutscene,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Agent::Code => "code",
            Agent::Art2d => "art2d",
            Agent::Art3d => "art3d",
            Agent::Audio => "audio",
            Agent::Shader => "shader",
            Agent::Level => "level",
            Agent::Ui => "ui",
            Agent::Lighting => "lighting",
            Agent::Physics => "physics",
            Agent::Cutscene => "cutscene",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Agent::Code => "Code Generator",
            Agent::Art2d => "2D Artist",
            Agent::Art3d => "3D Artist",
            Agent::Audio => "Audio Designer",
            Agent::Shader => "Shader Artist",
            Agent::Level => "Level Designer",
            Agent::Ui => "UI Designer",
            Agent::Lighting => "Lighting Artist",
            Agent::Physics => "Physics Engineer",
            Agent::Cutscene => "Cutscene Director",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Agent::Code => "Generates game scripts and logic",
            Agent::Art2d => "Creates sprites, textures, and 2D assets",
            Agent::Art3d => "Creates 3D models, animations, and environments",
            Agent::Audio => "Generates music, sound effects, and voices",
            Agent::Shader => "Creates visual effects and shaders",
            Agent::Level => "Designs game levels and layouts",
            Agent::Ui => "Creates user interfaces and menus",
            Agent::Lighting => "Sets up lighting and atmosphere",
            Agent::Physics => "Implements physics and interactions",
            Agent::Cutscene => "Creates cinematic sequences",
        }
    }

    /// File names the simulated agent produces.
    pub fn sample_assets(self) -> &'static [&'static str] {
        match self {
            Agent::Code => &["PlayerController.cs", "GameManager.cs", "InventorySystem.cs"],
            Agent::Art2d => &["character_sprite.png", "background.jpg", "ui_elements.png"],
            Agent::Art3d => &["character_model.fbx", "environment.obj", "animations.anim"],
            Agent::Audio => &["background_music.wav", "jump_sound.mp3", "ambient.ogg"],
            Agent::Shader => &["water_shader.shader", "glow_effect.hlsl", "particle_system.mat"],
            Agent::Level => &["level_01.scene", "level_02.scene", "boss_arena.scene"],
            Agent::Ui => &["main_menu.prefab", "hud_overlay.prefab", "settings_panel.prefab"],
            Agent::Lighting => &["lighting_setup.lighting", "environment_probe.exr"],
            Agent::Physics => &["physics_materials.physicMaterial", "collision_meshes.mesh"],
            Agent::Cutscene => &["intro_cutscene.timeline", "ending_sequence.playable"],
        }
    }
}

impl std::str::FromStr for Agent {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self> {
        Agent::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| JobError::InvalidArgument(format!("unknown agent: {s}")))
    }
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalogue entry as served to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub id: Agent,
    pub name: &'static str,
    pub description: &'static str,
}

impl From<Agent> for AgentInfo {
    fn from(agent: Agent) -> Self {
        Self {
            id: agent,
            name: agent.name(),
            description: agent.description(),
        }
    }
}

/// Build target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Web,
    Pc,
    Mobile,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Web => "web",
            Platform::Pc => "pc",
            Platform::Mobile => "mobile",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
