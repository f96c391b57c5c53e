use std::{collections::BTreeMap, time::Duration};

use glam::Vec3;

use crate::{AnimationHandle, ModelHandle, Scene, Template};

#[derive(Clone, Debug)]
struct Node {
    asset: String,
    position: Vec3,
    parent: Option<ModelHandle>,
}

#[derive(Clone, Copy, Debug)]
struct Motion {
    handle: AnimationHandle,
    model: ModelHandle,
    from: Vec3,
    to: Vec3,
    duration: Duration,
    elapsed: Duration,
}

/// Scene without any rendering backend, driven by explicit clock advances.
///
/// Animations of models that were detached before finishing never report
/// completion.
#[derive(Debug, Default)]
pub struct HeadlessScene {
    next_model: u64,
    next_animation: u64,
    nodes: BTreeMap<ModelHandle, Node>,
    motions: Vec<Motion>,
    completed: Vec<AnimationHandle>,
}

impl HeadlessScene {
    /// Creates an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances every running animation by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        let nodes = &mut self.nodes;
        let completed = &mut self.completed;
        self.motions.retain_mut(|motion| {
            let Some(node) = nodes.get_mut(&motion.model) else {
                return false;
            };

            motion.elapsed = motion.elapsed.saturating_add(dt).min(motion.duration);
            let progress = if motion.duration.is_zero() {
                1.0
            } else {
                motion.elapsed.as_secs_f32() / motion.duration.as_secs_f32()
            };
            node.position = motion.from.lerp(motion.to, progress);

            if motion.elapsed >= motion.duration {
                completed.push(motion.handle);
                false
            } else {
                true
            }
        });
    }

    /// Number of models currently in the scene.
    #[must_use]
    pub fn model_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of animations still running.
    #[must_use]
    pub fn running_animations(&self) -> usize {
        self.motions.len()
    }

    /// Asset the model was instantiated from.
    #[must_use]
    pub fn asset(&self, model: ModelHandle) -> Option<&str> {
        self.nodes.get(&model).map(|node| node.asset.as_str())
    }

    /// Current position of the model.
    #[must_use]
    pub fn position(&self, model: ModelHandle) -> Option<Vec3> {
        self.nodes.get(&model).map(|node| node.position)
    }

    /// Children attached to `model`, in creation order.
    #[must_use]
    pub fn children(&self, model: ModelHandle) -> Vec<ModelHandle> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.parent == Some(model))
            .map(|(handle, _)| *handle)
            .collect()
    }
}

impl Scene for HeadlessScene {
    fn spawn_visual(&mut self, template: &Template, position: Vec3) -> ModelHandle {
        let handle = ModelHandle::new(self.next_model);
        self.next_model += 1;
        let _ = self.nodes.insert(
            handle,
            Node {
                asset: template.asset().to_owned(),
                position,
                parent: None,
            },
        );
        handle
    }

    fn attach(&mut self, model: ModelHandle, parent: ModelHandle) {
        if !self.nodes.contains_key(&parent) {
            log::debug!("cannot attach model {} to missing parent", model.get());
            return;
        }
        if let Some(node) = self.nodes.get_mut(&model) {
            node.parent = Some(parent);
        }
    }

    fn detach(&mut self, model: ModelHandle) {
        let mut pending = vec![model];
        while let Some(handle) = pending.pop() {
            if self.nodes.remove(&handle).is_none() {
                continue;
            }
            pending.extend(self.children(handle));
        }
    }

    fn animate_move(&mut self, model: ModelHandle, to: Vec3, duration: Duration) -> AnimationHandle {
        let handle = AnimationHandle::new(self.next_animation);
        self.next_animation += 1;
        let from = self.position(model).unwrap_or(to);
        self.motions.push(Motion {
            handle,
            model,
            from,
            to,
            duration,
            elapsed: Duration::ZERO,
        });
        handle
    }

    fn completed_animations(&mut self) -> Vec<AnimationHandle> {
        std::mem::take(&mut self.completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn animation_completes_after_its_duration() {
        let mut scene = HeadlessScene::new();
        let model = scene.spawn_visual(&Template::new("bullet"), Vec3::ZERO);
        let animation =
            scene.animate_move(model, Vec3::new(4.0, 0.0, 0.0), Duration::from_millis(500));

        scene.advance(Duration::from_millis(250));
        assert!(scene.completed_animations().is_empty());
        assert_eq!(scene.position(model), Some(Vec3::new(2.0, 0.0, 0.0)));

        scene.advance(Duration::from_millis(250));
        assert_eq!(scene.completed_animations(), vec![animation]);
        assert!(scene.completed_animations().is_empty(), "completions drain once");
        assert_eq!(scene.running_animations(), 0);
    }

    #[test]
    fn detaching_removes_children_and_silences_animations() {
        let mut scene = HeadlessScene::new();
        let parent = scene.spawn_visual(&Template::new("creep"), Vec3::ZERO);
        let child = scene.spawn_visual(&Template::new("bar"), Vec3::ZERO);
        scene.attach(child, parent);
        let _ = scene.animate_move(parent, Vec3::ONE, Duration::from_millis(10));

        scene.detach(parent);
        scene.advance(Duration::from_secs(1));

        assert_eq!(scene.model_count(), 0);
        assert!(scene.completed_animations().is_empty());
    }
}
