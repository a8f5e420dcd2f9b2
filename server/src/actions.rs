//! Player actions against the world: movement, inventory, crafting and
//! structure placement. Interactions are resolved in `combat`.

use log::debug;
use shared::{item_info, Action, ItemDrop, ObjectKind, Recipe, ServerEvent, TileKey};

use crate::entity::{PlayerState, WorldObject};
use crate::error::ActionError;
use crate::game::{GameState, Outbound};
use crate::physics::{attempt_move, CollisionWorld, MoveOutcome};

fn ensure_room(player: &PlayerState, item: &str, amount: u32) -> Result<(), ActionError> {
    match item_info(item) {
        Some(info) if player.item_count(item).saturating_add(amount) > info.max_stack => {
            Err(ActionError::StackFull {
                item: item.to_string(),
                max: info.max_stack,
            })
        }
        _ => Ok(()),
    }
}

fn ensure_items(player: &PlayerState, item: &str, required: u32) -> Result<(), ActionError> {
    let available = player.item_count(item);
    if available < required {
        return Err(ActionError::InsufficientItems {
            item: item.to_string(),
            required,
            available,
        });
    }
    Ok(())
}

impl GameState {
    /// Applies one action for a session and returns the events it produced.
    /// Refused actions are logged and produce nothing.
    pub fn handle_action(&mut self, session: &str, action: Action, now: u64) -> Vec<Outbound> {
        match self.apply(session, action, now) {
            Ok(outbound) => outbound,
            Err(e) => {
                debug!("Refused action from {}: {}", session, e);
                Vec::new()
            }
        }
    }

    fn apply(
        &mut self,
        session: &str,
        action: Action,
        now: u64,
    ) -> Result<Vec<Outbound>, ActionError> {
        let outbound = match action {
            Action::Move { x, y, seq_id } => {
                self.move_player(session, x, y, seq_id)?;
                Vec::new()
            }
            Action::CollectItem { item } => {
                self.collect_item(session, &item)?;
                self.inventory_for(session)
            }
            Action::RemoveItem { item, amount } => {
                self.remove_item(session, &item, amount)?;
                self.inventory_for(session)
            }
            Action::DropItem { item } => {
                let (x, y, drop) = self.drop_item(session, &item)?;
                let mut outbound = self.inventory_for(session);
                outbound.push(Outbound::to_all(ServerEvent::ItemSpawn {
                    x,
                    y,
                    drops: vec![drop],
                }));
                outbound
            }
            Action::Craft { recipe } => {
                self.craft(session, recipe)?;
                let mut outbound = vec![Outbound::to_session(
                    session,
                    ServerEvent::ItemCrafted {
                        item: recipe.output().to_string(),
                    },
                )];
                outbound.extend(self.inventory_for(session));
                outbound
            }
            Action::Place { kind, x, y } => {
                let placed = self.place(session, kind, x, y)?;
                let mut outbound = vec![Outbound::to_all(ServerEvent::ObjectPlaced {
                    kind: placed.kind,
                    x: placed.x,
                    y: placed.y,
                    owner: placed.owner,
                })];
                outbound.extend(self.inventory_for(session));
                outbound
            }
            Action::Pickup { x, y } => {
                let removed = self.pickup_structure(session, x, y)?;
                let mut outbound = vec![Outbound::to_all(ServerEvent::ObjectRemoved {
                    x: removed.x,
                    y: removed.y,
                    drops: vec![ItemDrop::new(removed.kind.name(), 1)],
                })];
                outbound.extend(self.inventory_for(session));
                outbound
            }
            Action::Interact { x, y } => self
                .resolve_interaction(session, x, y, now)?
                .events()
                .into_iter()
                .map(Outbound::to_all)
                .collect(),
        };
        Ok(outbound)
    }

    fn inventory_for(&self, session: &str) -> Vec<Outbound> {
        self.inventory_update(session)
            .map(|event| Outbound::to_session(session, event))
            .into_iter()
            .collect()
    }

    fn player_entry(&mut self, session: &str) -> Result<&mut PlayerState, ActionError> {
        self.players
            .get_mut(session)
            .ok_or_else(|| ActionError::UnknownSession(session.to_string()))
    }

    pub fn move_player(
        &mut self,
        session: &str,
        x: f64,
        y: f64,
        seq_id: u64,
    ) -> Result<MoveOutcome, ActionError> {
        let world = CollisionWorld::new(&self.terrain, &self.objects);
        let player = self
            .players
            .get_mut(session)
            .ok_or_else(|| ActionError::UnknownSession(session.to_string()))?;
        Ok(attempt_move(&world, player, x, y, seq_id, &self.tuning))
    }

    /// Credits one unit of a picked-up item drop.
    pub fn collect_item(&mut self, session: &str, item: &str) -> Result<(), ActionError> {
        let player = self.player_entry(session)?;
        ensure_room(player, item, 1)?;
        player.add_item(item, 1);
        Ok(())
    }

    /// Removes up to `amount`, never below zero. Returns how many went.
    pub fn remove_item(
        &mut self,
        session: &str,
        item: &str,
        amount: u32,
    ) -> Result<u32, ActionError> {
        Ok(self.player_entry(session)?.remove_item(item, amount))
    }

    /// Removes one unit and returns where it lands.
    pub fn drop_item(
        &mut self,
        session: &str,
        item: &str,
    ) -> Result<(f64, f64, ItemDrop), ActionError> {
        let player = self.player_entry(session)?;
        ensure_items(player, item, 1)?;
        player.remove_item(item, 1);
        Ok((player.x, player.y, ItemDrop::new(item, 1)))
    }

    /// Consumes every ingredient and credits the output, or changes nothing.
    pub fn craft(&mut self, session: &str, recipe: Recipe) -> Result<(), ActionError> {
        let player = self.player_entry(session)?;
        for &(item, required) in recipe.ingredients() {
            ensure_items(player, item, required)?;
        }
        ensure_room(player, recipe.output(), 1)?;

        for &(item, required) in recipe.ingredients() {
            player.remove_item(item, required);
        }
        player.add_item(recipe.output(), 1);
        debug!("{} crafted {}", session, recipe.name());
        Ok(())
    }

    /// Places a held structure on a free, buildable tile.
    pub fn place(
        &mut self,
        session: &str,
        kind: ObjectKind,
        x: i32,
        y: i32,
    ) -> Result<WorldObject, ActionError> {
        let key = TileKey::new(x, y);
        if !kind.is_structure() {
            return Err(ActionError::NotPlaceable(kind.to_string()));
        }
        if self.terrain.is_void(x, y) {
            return Err(ActionError::Unbuildable(key.to_string()));
        }
        if self.objects.contains_key(&key) {
            return Err(ActionError::TileOccupied(key.to_string()));
        }

        let player = self
            .players
            .get_mut(session)
            .ok_or_else(|| ActionError::UnknownSession(session.to_string()))?;
        ensure_items(player, kind.name(), 1)?;
        player.remove_item(kind.name(), 1);

        let object = WorldObject::placed_by(kind, x, y, session);
        self.objects.insert(key, object.clone());
        debug!("{} placed {} at {}", session, kind, key);
        Ok(object)
    }

    /// Removes a structure and hands back exactly what was removed.
    /// Natural resources are only harvested through interactions.
    pub fn pickup_structure(
        &mut self,
        session: &str,
        x: i32,
        y: i32,
    ) -> Result<WorldObject, ActionError> {
        if !self.players.contains_key(session) {
            return Err(ActionError::UnknownSession(session.to_string()));
        }
        let key = TileKey::new(x, y);
        match self.objects.get(&key) {
            Some(object) if object.kind.is_structure() => {}
            _ => return Err(ActionError::NotRemovable(key.to_string())),
        }
        let removed = self
            .objects
            .remove(&key)
            .ok_or_else(|| ActionError::NotRemovable(key.to_string()))?;
        debug!("{} picked up {} at {}", session, removed.kind, key);
        Ok(removed)
    }
}
