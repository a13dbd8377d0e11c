use crate::{dynamic_object::EntityId, mesh_collider::SurfaceType};
use glam::Vec3;
use log::{debug, warn};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContactId(u32);

impl ContactId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Contact {
    /// Points away from the other party toward the object that owns the contact.
    pub normal: Vec3,
    pub point: Vec3,
    pub surface_type: SurfaceType,
    /// `EntityId::NONE` for static geometry.
    pub other_object: EntityId,
    pub next: Option<ContactId>,
}

impl Default for Contact {
    fn default() -> Self {
        Self {
            normal: Vec3::Y,
            point: Vec3::ZERO,
            surface_type: SurfaceType::Default,
            other_object: EntityId::NONE,
            next: None,
        }
    }
}

/// Fixed size slab of contacts. Each live contact sits on exactly one list:
/// the free stack or a singly linked list owned by an object or trigger.
pub struct ContactPool {
    contacts: Vec<Contact>,
    in_use: Vec<bool>,
    free: Vec<ContactId>,
}

pub struct ContactIter<'a> {
    pool: &'a ContactPool,
    next: Option<ContactId>,
}

impl<'a> Iterator for ContactIter<'a> {
    type Item = (ContactId, &'a Contact);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let contact = &self.pool.contacts[id.index()];
        self.next = contact.next;
        Some((id, contact))
    }
}

impl ContactPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            contacts: vec![Contact::default(); capacity],
            in_use: vec![false; capacity],
            free: (0..capacity as u32).rev().map(ContactId).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.contacts.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn active_count(&self) -> usize {
        self.capacity() - self.free.len()
    }

    /// Puts every contact back on the free list.
    pub fn clear(&mut self) {
        let capacity = self.capacity();
        self.in_use.iter_mut().for_each(|used| *used = false);
        self.free.clear();
        self.free.extend((0..capacity as u32).rev().map(ContactId));
    }

    /// Takes a free contact without linking it anywhere. `None` when the pool
    /// is exhausted, the caller just skips recording the contact.
    pub fn allocate(&mut self, contact: Contact) -> Option<ContactId> {
        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                debug!("contact pool exhausted, dropping contact with {:?}", contact.other_object);
                return None;
            }
        };
        self.in_use[id.index()] = true;
        self.contacts[id.index()] = Contact { next: None, ..contact };
        Some(id)
    }

    /// Allocates a contact and links it in front of the list at `head`.
    pub fn push_front(&mut self, head: &mut Option<ContactId>, contact: Contact) -> Option<ContactId> {
        let id = self.allocate(contact)?;
        self.contacts[id.index()].next = *head;
        *head = Some(id);
        Some(id)
    }

    /// Links an already allocated contact in front of the list at `head`.
    pub fn link_front(&mut self, head: &mut Option<ContactId>, id: ContactId) {
        self.contacts[id.index()].next = *head;
        *head = Some(id);
    }

    pub fn release(&mut self, id: ContactId) {
        if !self.in_use[id.index()] {
            warn!("contact {:?} released twice", id);
            return;
        }
        self.in_use[id.index()] = false;
        self.contacts[id.index()].next = None;
        self.free.push(id);
    }

    /// Returns a whole list to the pool and empties `head`.
    pub fn return_contacts(&mut self, head: &mut Option<ContactId>) {
        let mut next = head.take();
        while let Some(id) = next {
            next = self.contacts[id.index()].next;
            self.release(id);
        }
    }

    pub fn get(&self, id: ContactId) -> &Contact {
        &self.contacts[id.index()]
    }

    pub fn get_mut(&mut self, id: ContactId) -> &mut Contact {
        &mut self.contacts[id.index()]
    }

    pub fn iter(&self, head: Option<ContactId>) -> ContactIter<'_> {
        ContactIter { pool: self, next: head }
    }
}
