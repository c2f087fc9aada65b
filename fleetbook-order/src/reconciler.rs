use std::collections::HashMap;

use fleetbook_catalog::Classifier;
use fleetbook_core::CoreError;
use fleetbook_shared::models::booking::{is_placeholder, NOT_AVAILABLE};
use fleetbook_shared::{Booking, BookingCategory, PaymentProofRecord, PaymentType, Provenance, TripHints};
use tracing::{debug, warn};

use crate::models::ReconcileStats;

/// Result of merging the ticket and proof sources
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub bookings: Vec<Booking>,
    pub stats: ReconcileStats,
}

/// Hashed lookups over the proof batch. Each proof is consumed at most once.
struct ProofIndex {
    by_key: HashMap<String, usize>,
    by_passenger: HashMap<(String, String), Vec<usize>>,
    consumed: Vec<bool>,
}

impl ProofIndex {
    fn build(proofs: &[PaymentProofRecord]) -> Self {
        let mut by_key = HashMap::new();
        let mut by_passenger: HashMap<(String, String), Vec<usize>> = HashMap::new();

        // Ref guesses take the key space first; source ids only fill what is left.
        for (i, proof) in proofs.iter().enumerate() {
            if let Some(guess) = proof.booking_ref_guess.as_deref().filter(|g| !g.trim().is_empty()) {
                by_key.entry(guess.trim().to_string()).or_insert(i);
            }
        }
        for (i, proof) in proofs.iter().enumerate() {
            if !proof.source_id.trim().is_empty() {
                by_key.entry(proof.source_id.trim().to_string()).or_insert(i);
            }
        }
        for (i, proof) in proofs.iter().enumerate() {
            if let Some(pair) = passenger_pair(proof.passenger_name.expose(), &proof.vehicle_number) {
                by_passenger.entry(pair).or_default().push(i);
            }
        }

        Self {
            by_key,
            by_passenger,
            consumed: vec![false; proofs.len()],
        }
    }

    fn lookup(&self, key: &str) -> Option<usize> {
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        self.by_key.get(key).copied().filter(|&i| !self.consumed[i])
    }

    /// Unconsumed candidates for a (passenger, vehicle) pair, in input order
    fn candidates(&self, name: &str, vehicle_number: &str) -> Vec<usize> {
        passenger_pair(name, vehicle_number)
            .and_then(|pair| self.by_passenger.get(&pair))
            .map(|candidates| candidates.iter().copied().filter(|&i| !self.consumed[i]).collect())
            .unwrap_or_default()
    }
}

fn passenger_pair(name: &str, vehicle_number: &str) -> Option<(String, String)> {
    if is_placeholder(name) || is_placeholder(vehicle_number) {
        return None;
    }
    Some((name.trim().to_string(), vehicle_number.trim().to_string()))
}

/// Merges ticket bookings with payment proofs so each booking reference appears once.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    classifier: Classifier,
}

impl Reconciler {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }

    pub fn reconcile(&self, tickets: Vec<Booking>, proofs: Vec<PaymentProofRecord>) -> Reconciliation {
        let mut stats = ReconcileStats::default();
        let mut index = ProofIndex::build(&proofs);
        let mut bookings: Vec<Booking> = Vec::with_capacity(tickets.len() + proofs.len());
        let mut by_ref: HashMap<String, usize> = HashMap::new();

        // 1. Tickets, attaching at most one proof each
        for mut ticket in tickets {
            if ticket.has_ref() {
                if let Some(&existing) = by_ref.get(&ticket.booking_ref) {
                    warn!(booking_ref = %ticket.booking_ref, "Duplicate ticket reference, folding into first record");
                    fold_seats(&mut bookings[existing], &ticket);
                    stats.duplicates_folded += 1;
                    continue;
                }
            }

            if ticket.payment_type.accepts_proof() {
                if let Some(i) = self.find_proof(&index, &ticket, &mut stats) {
                    index.consumed[i] = true;
                    merge_proof(&mut ticket, proofs[i].clone());
                    stats.merged += 1;
                }
            }

            if ticket.has_ref() {
                by_ref.insert(ticket.booking_ref.clone(), bookings.len());
            }
            bookings.push(ticket);
        }

        // 2. Leftover proofs become bookings of their own
        for (i, proof) in proofs.into_iter().enumerate() {
            if index.consumed[i] {
                continue;
            }
            let booking = self.proof_booking(proof);
            if booking.has_ref() && by_ref.contains_key(&booking.booking_ref) {
                warn!(booking_ref = %booking.booking_ref, "Unmatched proof shares a reference with an existing booking, dropping");
                stats.proofs_dropped += 1;
                continue;
            }
            if booking.has_ref() {
                by_ref.insert(booking.booking_ref.clone(), bookings.len());
            }
            bookings.push(booking);
            stats.proof_only += 1;
        }

        debug!(
            total = bookings.len(),
            merged = stats.merged,
            proof_only = stats.proof_only,
            "Reconciliation complete"
        );
        Reconciliation { bookings, stats }
    }

    /// Reference, then id, then (passenger, vehicle). First hit wins.
    fn find_proof(&self, index: &ProofIndex, ticket: &Booking, stats: &mut ReconcileStats) -> Option<usize> {
        if let Some(i) = index.lookup(&ticket.booking_ref) {
            return Some(i);
        }
        if !is_placeholder(&ticket.id) {
            if let Some(i) = index.lookup(&ticket.id) {
                return Some(i);
            }
        }

        let candidates = index.candidates(ticket.passenger_name.expose(), &ticket.vehicle_number);
        if candidates.len() > 1 {
            let ambiguity = CoreError::ReconciliationAmbiguous {
                booking_ref: ticket.booking_ref.clone(),
                candidates: candidates.len(),
            };
            warn!(error = %ambiguity, "Taking the first proof in input order");
            stats.ambiguous += 1;
        }
        candidates.first().copied()
    }

    fn proof_booking(&self, proof: PaymentProofRecord) -> Booking {
        let booking_ref = proof
            .booking_ref_guess
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .or_else(|| (!proof.source_id.is_empty()).then(|| format!("MANUAL-{}", proof.source_id)))
            .unwrap_or_default();

        let category = self.classifier.explain(&proof.signals, proof.amount).0;
        let seats = match category {
            BookingCategory::FullVehicle => Vec::new(),
            BookingCategory::Seat => proof.seats.clone(),
        };

        Booking {
            id: if proof.source_id.is_empty() {
                NOT_AVAILABLE.to_string()
            } else {
                proof.source_id.clone()
            },
            booking_ref,
            category,
            vehicle_id: proof.vehicle_id.clone(),
            vehicle_number: proof.vehicle_number.clone(),
            route_from: proof.route_from.clone(),
            route_to: proof.route_to.clone(),
            arrival_date: proof.arrival_date.clone(),
            arrival_time: proof.arrival_time.clone(),
            passenger_name: proof.passenger_name.clone(),
            passenger_contact: proof.passenger_contact.clone(),
            seats,
            amount: proof.amount,
            booking_status: proof.booking_status,
            payment_status: proof.payment_status,
            payment_type: proof_payment_type(proof.payment_type),
            source: Provenance::ProofOnly,
            signals: proof.signals.clone(),
            rental: proof.rental.clone(),
            hints: TripHints::default(),
            created_at: proof.created_at,
            proof: Some(proof),
        }
    }
}

/// A booking carrying a proof is always an online or manual payment.
fn proof_payment_type(payment_type: PaymentType) -> PaymentType {
    match payment_type {
        PaymentType::Online => PaymentType::Online,
        _ => PaymentType::Manual,
    }
}

fn merge_proof(ticket: &mut Booking, proof: PaymentProofRecord) {
    if proof.booking_status.is_known() {
        ticket.booking_status = proof.booking_status;
    }
    if proof.payment_status.is_known() {
        ticket.payment_status = proof.payment_status;
    }
    if proof.amount > 0.0 {
        ticket.amount = proof.amount;
    }
    if ticket.payment_type == PaymentType::Unknown {
        ticket.payment_type = proof_payment_type(proof.payment_type);
    }
    ticket.source = Provenance::Merged;
    ticket.proof = Some(proof);
}

fn fold_seats(first: &mut Booking, duplicate: &Booking) {
    for seat in &duplicate.seats {
        if !first.seats.contains(seat) {
            first.seats.push(seat.clone());
        }
    }
}
