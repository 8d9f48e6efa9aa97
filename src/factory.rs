//! Entity construction: per-type builders, the recycle pool and the
//! [`Spawner`] system parameter that ties them together.
//!
//! All structural changes go through [`Commands`], so spawning from inside a
//! system is deferred to the end of the tick like every other mutation.

use std::collections::HashMap;
use std::sync::Arc;

use bevy_ecs::prelude::*;
use bevy_ecs::system::{EntityCommands, SystemParam};
use glam::Vec2;
use tracing::{debug, error};

use crate::behavior::{melee_unit_tree, AiController, BehaviorNode};
use crate::components::*;
use crate::config::GameSettings;
use crate::navigation::FlowFieldManager;

/// Squared distance at which a unit counts as arrived.
pub const UNIT_STOP_DISTANCE_SQ: f32 = 100.0;

/// Where and for whom an entity is being built.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext {
    pub position: Vec2,
    pub team: u32,
    /// Initial move order for produced units.
    pub rally: RallyPoint,
}

impl BuildContext {
    pub fn new(position: Vec2, team: u32) -> Self {
        Self {
            position,
            team,
            rally: RallyPoint::default(),
        }
    }

    pub fn with_rally(mut self, rally: RallyPoint) -> Self {
        self.rally = rally;
        self
    }
}

/// Shared read-only state builders draw from.
pub struct BuildResources<'a> {
    pub settings: &'a GameSettings,
    pub flow_fields: &'a FlowFieldManager,
}

/// Inserts the full component set of one entity type.
///
/// Builders always insert every component of their archetype so a recycled
/// entity ends up identical to a fresh one.
pub trait EntityBuilder: Send + Sync + 'static {
    fn build(&self, entity: &mut EntityCommands, ctx: &BuildContext, res: &BuildResources);
}

fn initial_animation(settings: &GameSettings, kind: EntityType, anim: AnimationKind, dir: Direction) -> AnimationState {
    let mut state = AnimationState::empty(kind);
    state.switch(settings, anim, dir);
    state
}

/// Melee foot soldier driven by the shared melee tree.
pub struct InfantryBuilder {
    tree: Arc<dyn BehaviorNode>,
}

impl InfantryBuilder {
    pub fn new(tree: Arc<dyn BehaviorNode>) -> Self {
        Self { tree }
    }
}

impl Default for InfantryBuilder {
    fn default() -> Self {
        Self::new(melee_unit_tree())
    }
}

impl EntityBuilder for InfantryBuilder {
    fn build(&self, entity: &mut EntityCommands, ctx: &BuildContext, res: &BuildResources) {
        let kind = EntityType::Infantry;
        let stats = res.settings.stats(kind);

        let (destination, flow) = if ctx.rally.is_set {
            let field = res.flow_fields.get_flow_field(ctx.rally.target);
            (
                Destination::towards(ctx.rally.target, UNIT_STOP_DISTANCE_SQ),
                FlowFieldRef::new(field.as_ref()),
            )
        } else {
            (Destination::idle(UNIT_STOP_DISTANCE_SQ), FlowFieldRef::default())
        };

        entity.insert((
            (
                Position(ctx.position),
                Velocity::default(),
                MoveSpeed(stats.move_speed),
                BodyCollider::circle(stats.size, Vec2::new(0.0, 20.0), 40.0),
                RenderSize(Vec2::new(57.5, 89.0)),
                destination,
                flow,
            ),
            (
                EntityClass(kind),
                TeamId(ctx.team),
                Health::new(stats.max_hp),
                CombatStats {
                    attack_damage: stats.attack_damage,
                    attack_range: stats.attack_range,
                    attack_interval: stats.attack_speed,
                    cooldown: 0.0,
                    vision_range: stats.vision_range,
                },
                AttackTarget::default(),
                Selectable,
                Facing(Direction::South),
                initial_animation(res.settings, kind, AnimationKind::Idle, Direction::South),
                AiController::new(Arc::clone(&self.tree)),
            ),
        ));
    }
}

/// Production building that trains infantry on a timer.
pub struct BarracksBuilder;

impl BarracksBuilder {
    pub const PRODUCT: EntityType = EntityType::Infantry;
    /// Used when the product has no build time configured.
    pub const DEFAULT_INTERVAL: f32 = 10.0;
}

impl EntityBuilder for BarracksBuilder {
    fn build(&self, entity: &mut EntityCommands, ctx: &BuildContext, res: &BuildResources) {
        let kind = EntityType::Barracks;
        let stats = res.settings.stats(kind);
        let build_time = res.settings.stats(Self::PRODUCT).build_time;
        let interval = if build_time > 0.0 { build_time } else { Self::DEFAULT_INTERVAL };

        entity.insert((
            Position(ctx.position),
            BodyCollider::circle(stats.size, Vec2::new(0.0, 150.0), 999_999.0),
            RenderSize(Vec2::new(600.0, 600.0)),
            BuildingClass(kind),
            TeamId(ctx.team),
            Health::new(stats.max_hp),
            AutoProduction {
                interval,
                // First unit comes out on the next production pass
                progress: interval,
                product: Self::PRODUCT,
                rally: ctx.rally,
            },
            ProductionEnabled,
            Selectable,
            initial_animation(res.settings, kind, AnimationKind::Running, Direction::None),
        ));
    }
}

/// Builders by entity type.
#[derive(Resource, Default)]
pub struct BuilderRegistry {
    builders: HashMap<EntityType, Box<dyn EntityBuilder>>,
}

impl BuilderRegistry {
    pub fn with_default_builders() -> Self {
        let mut registry = Self::default();
        registry.register(EntityType::Infantry, InfantryBuilder::default());
        registry.register(EntityType::Barracks, BarracksBuilder);
        registry
    }

    pub fn register(&mut self, kind: EntityType, builder: impl EntityBuilder) {
        self.builders.insert(kind, Box::new(builder));
    }

    pub fn get(&self, kind: EntityType) -> Option<&dyn EntityBuilder> {
        self.builders.get(&kind).map(|b| b.as_ref())
    }
}

/// Free lists of disabled entities, per type.
#[derive(Resource, Debug, Default)]
pub struct EntityPool {
    free: HashMap<EntityType, Vec<Entity>>,
}

impl EntityPool {
    /// Retire `entity` into the pool. It keeps its components but is tagged
    /// [`Disabled`] and loses its transient tags when commands apply.
    pub fn despawn(&mut self, commands: &mut Commands, entity: Entity, kind: EntityType) {
        commands
            .entity(entity)
            .insert(Disabled)
            .remove::<(IsDying, IsSelected, IsHovered)>();
        self.free.entry(kind).or_default().push(entity);
        debug!(?entity, kind = kind.as_str(), "Entity pooled");
    }

    /// Most recently pooled entity of `kind`.
    pub fn pop(&mut self, kind: EntityType) -> Option<Entity> {
        self.free.get_mut(&kind)?.pop()
    }

    pub fn len(&self, kind: EntityType) -> usize {
        self.free.get(&kind).map_or(0, Vec::len)
    }

    pub fn total(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Creates entities from systems, reusing pooled ones first.
#[derive(SystemParam)]
pub struct Spawner<'w, 's> {
    commands: Commands<'w, 's>,
    pool: ResMut<'w, EntityPool>,
    builders: Res<'w, BuilderRegistry>,
    settings: Res<'w, GameSettings>,
    flow_fields: Res<'w, FlowFieldManager>,
}

impl Spawner<'_, '_> {
    /// Queue construction of a `kind` entity. `None` when no builder is
    /// registered for the type.
    pub fn spawn(&mut self, kind: EntityType, ctx: &BuildContext) -> Option<Entity> {
        let Some(builder) = self.builders.get(kind) else {
            error!(kind = kind.as_str(), "No builder registered for entity type");
            return None;
        };

        let entity = match self.pool.pop(kind) {
            Some(entity) => {
                self.commands
                    .entity(entity)
                    .remove::<(Disabled, IsDying, IsSelected, IsHovered)>();
                entity
            }
            None => self.commands.spawn_empty().id(),
        };

        let res = BuildResources {
            settings: &self.settings,
            flow_fields: &self.flow_fields,
        };
        builder.build(&mut self.commands.entity(entity), ctx, &res);
        Some(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tilemap::TileMap;
    use bevy_ecs::system::SystemState;

    fn world() -> World {
        let mut world = World::new();
        world.insert_resource(EntityPool::default());
        world.insert_resource(BuilderRegistry::with_default_builders());
        world.insert_resource(GameSettings::default());
        world.insert_resource(FlowFieldManager::new(&TileMap::new(40, 40, 50.0)));
        world
    }

    fn spawn(world: &mut World, kind: EntityType, ctx: BuildContext) -> Option<Entity> {
        let mut state: SystemState<Spawner> = SystemState::new(world);
        let entity = state.get_mut(world).spawn(kind, &ctx);
        state.apply(world);
        entity
    }

    #[test]
    fn test_infantry_archetype() {
        let mut world = world();
        let unit = spawn(&mut world, EntityType::Infantry, BuildContext::new(Vec2::new(10.0, 20.0), 1)).unwrap();

        assert_eq!(world.get::<Position>(unit).unwrap().0, Vec2::new(10.0, 20.0));
        assert_eq!(world.get::<TeamId>(unit).unwrap().0, 1);
        assert_eq!(world.get::<Health>(unit).unwrap().max, 100.0);
        assert_eq!(world.get::<BodyCollider>(unit).unwrap().offset, Vec2::new(0.0, 20.0));
        assert!(!world.get::<Destination>(unit).unwrap().active);
        assert!(world.get::<AiController>(unit).is_some());
        assert!(world.get::<Selectable>(unit).is_some());
        let anim = world.get::<AnimationState>(unit).unwrap();
        assert_eq!(anim.kind, AnimationKind::Idle);
        assert!(anim.active);
    }

    #[test]
    fn test_rally_point_gives_move_order() {
        let mut world = world();
        let rally = RallyPoint::at(Vec2::new(600.0, 600.0));
        let ctx = BuildContext::new(Vec2::new(100.0, 100.0), 0).with_rally(rally);
        let unit = spawn(&mut world, EntityType::Infantry, ctx).unwrap();

        let dest = world.get::<Destination>(unit).unwrap();
        assert!(dest.active);
        assert_eq!(dest.target, Vec2::new(600.0, 600.0));
        assert!(world.get::<FlowFieldRef>(unit).unwrap().resolve().is_some());
    }

    #[test]
    fn test_barracks_archetype() {
        let mut world = world();
        let barracks = spawn(&mut world, EntityType::Barracks, BuildContext::new(Vec2::ZERO, 0)).unwrap();

        let production = world.get::<AutoProduction>(barracks).unwrap();
        assert_eq!(production.product, EntityType::Infantry);
        assert_eq!(production.progress, production.interval);
        assert!(world.get::<ProductionEnabled>(barracks).is_some());
        assert!(world.get::<BuildingClass>(barracks).is_some());
        assert!(world.get::<Velocity>(barracks).is_none());
        assert_eq!(world.get::<BodyCollider>(barracks).unwrap().size.x, 150.0);
    }

    #[test]
    fn test_pooled_entity_is_reused_and_reset() {
        let mut world = world();
        let unit = spawn(&mut world, EntityType::Infantry, BuildContext::new(Vec2::ZERO, 0)).unwrap();
        world.get_mut::<Health>(unit).unwrap().current = 0.0;
        world.entity_mut(unit).insert((IsDying, IsSelected));

        let mut state: SystemState<(Commands, ResMut<EntityPool>)> = SystemState::new(&mut world);
        let (mut commands, mut pool) = state.get_mut(&mut world);
        pool.despawn(&mut commands, unit, EntityType::Infantry);
        state.apply(&mut world);

        assert!(world.get::<Disabled>(unit).is_some());
        assert!(world.get::<IsDying>(unit).is_none());
        assert!(world.get::<IsSelected>(unit).is_none());
        assert_eq!(world.resource::<EntityPool>().len(EntityType::Infantry), 1);

        let reused = spawn(&mut world, EntityType::Infantry, BuildContext::new(Vec2::new(5.0, 5.0), 2)).unwrap();
        assert_eq!(reused, unit);
        assert!(world.get::<Disabled>(reused).is_none());
        assert_eq!(world.get::<Health>(reused).unwrap().current, 100.0);
        assert_eq!(world.get::<TeamId>(reused).unwrap().0, 2);
        assert!(world.resource::<EntityPool>().is_empty());
    }

    #[test]
    fn test_missing_builder_returns_none() {
        let mut world = world();
        world.insert_resource(BuilderRegistry::default());
        assert!(spawn(&mut world, EntityType::Infantry, BuildContext::new(Vec2::ZERO, 0)).is_none());
        assert_eq!(world.entities().len(), 0);
    }
}
