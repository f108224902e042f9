/// Router Module Index
///
/// Routes are grouped by resource. Each protected handler carries its own
/// guard stack, declared in execution order.

/// Routes with no guards: landing, health and the public listing pages.
pub mod public;

/// Listing CRUD behind the identity, validation and ownership guards.
pub mod listings;

/// Review sub-resource routes behind the identity, validation and authorship guards.
pub mod reviews;

/// Signup, login and logout.
pub mod users;
