//! Bogotá locations for realistic test fixtures.
//!
//! Coordinates are street-level points from OpenStreetMap.

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub id: &'static str,
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(id: &'static str, name: &'static str, lat: f64, lng: f64) -> Self {
        Self { id, name, lat, lng }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

// ============================================================================
// Plant (depot)
// ============================================================================

pub const PLANT: Location = Location::new("plant", "Planta Puente Aranda", 4.6261, -74.1103);

// ============================================================================
// Fixed checkpoints (branches)
// ============================================================================

pub const BRANCHES: &[Location] = &[
    Location::new("branch-chapinero", "Sucursal Chapinero", 4.6486, -74.0628),
    Location::new("branch-usaquen", "Sucursal Usaquén", 4.6951, -74.0318),
];

// ============================================================================
// Customers spread across the city
// ============================================================================

pub const CUSTOMERS: &[Location] = &[
    Location::new("c-teusaquillo", "Hotel Teusaquillo", 4.6358, -74.0775),
    Location::new("c-galerias", "Clínica Galerías", 4.6434, -74.0746),
    Location::new("c-salitre", "Hotel Salitre", 4.6509, -74.1030),
    Location::new("c-kennedy", "Restaurante Kennedy", 4.6275, -74.1519),
    Location::new("c-fontibon", "Gimnasio Fontibón", 4.6733, -74.1414),
    Location::new("c-cedritos", "Spa Cedritos", 4.7241, -74.0403),
    Location::new("c-candelaria", "Hostal La Candelaria", 4.5967, -74.0727),
    Location::new("c-restrepo", "Peluquería Restrepo", 4.5887, -74.1020),
];

// ============================================================================
// A tight group of customers on one block (within 100 m)
// ============================================================================

pub const ZONA_T_BLOCK: &[Location] = &[
    Location::new("t-1", "Hotel Zona T Norte", 4.66700, -74.05350),
    Location::new("t-2", "Restaurante Zona T", 4.66730, -74.05380),
    Location::new("t-3", "Bar Zona T Sur", 4.66680, -74.05400),
];
