//! Static element data: symbols, subshell ordering and ionization-energy tables.
//!
//! Everything here is immutable process-wide data exposed through
//! atomic-number keyed lookups.

pub const MAX_ATOMIC_NUMBER: usize = 100;

pub const ELEMENT_SYMBOLS: [&str; MAX_ATOMIC_NUMBER] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm",
];

/// Angular momentum letters indexed by `l`.
pub const ANGULAR_LETTERS: [char; 7] = ['s', 'p', 'd', 'f', 'g', 'h', 'i'];

/// Subshells in filling (Madelung) order as `(n, l)`.
pub const FILLING_ORDER: [(u8, u8); 18] = [
    (1, 0),
    (2, 0),
    (2, 1),
    (3, 0),
    (3, 1),
    (4, 0),
    (3, 2),
    (4, 1),
    (5, 0),
    (4, 2),
    (5, 1),
    (6, 0),
    (4, 3),
    (5, 2),
    (6, 1),
    (7, 0),
    (5, 3),
    (6, 2),
];

const ALUMINIUM_IONIZATION_ENERGIES: [f64; 13] = [
    5.985769, 18.82855, 28.447642, 119.9924, 153.8252, 190.49, 241.76, 284.64, 330.21, 398.65,
    442.005, 2085.97702, 2304.140359,
];

const GERMANIUM_IONIZATION_ENERGIES: [f64; 32] = [
    6.504, 14.58, 33.71, 44.91, 88.51, 115.8, 145.3, 176.8, 210.2, 245.5, 283.5, 322.3, 362.9,
    405.0, 525.7, 566.9, 608.8, 651.5, 702.0, 746.3, 836.0, 877.1, 2176.0, 2303.0, 2433.0, 2565.0,
    2738.0, 2875.0, 3072.0, 3180.0, 13490.0, 14120.0,
];

pub fn element_symbol(atomic_number: usize) -> Option<&'static str> {
    let index = index_for_atomic_number(atomic_number)?;
    Some(ELEMENT_SYMBOLS[index])
}

pub fn atomic_number_for_symbol(symbol: &str) -> Option<usize> {
    let normalized = symbol.trim();
    if normalized.is_empty() {
        return None;
    }

    ELEMENT_SYMBOLS
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(normalized))
        .map(|index| index + 1)
}

/// Tabulated ionization energies `χ_0..χ_{Z-1}` in eV, where `χ_k` removes an
/// electron from the `k`-times ionized atom.
pub fn ionization_energies(atomic_number: usize) -> Option<&'static [f64]> {
    match atomic_number {
        13 => Some(&ALUMINIUM_IONIZATION_ENERGIES),
        32 => Some(&GERMANIUM_IONIZATION_ENERGIES),
        _ => None,
    }
}

pub fn tabulated_atomic_numbers() -> &'static [usize] {
    &[13, 32]
}

pub const fn subshell_capacity(l: u8) -> u32 {
    4 * l as u32 + 2
}

pub fn subshell_label(n: u8, l: u8) -> Option<String> {
    let letter = ANGULAR_LETTERS.get(l as usize)?;
    Some(format!("{n}{letter}"))
}

/// Parses labels such as `3d` into `(n, l)`.
pub fn parse_subshell_label(label: &str) -> Option<(u8, u8)> {
    let label = label.trim();
    let letter = label.chars().last()?;
    let n: u8 = label[..label.len() - letter.len_utf8()].parse().ok()?;
    let l = ANGULAR_LETTERS
        .iter()
        .position(|candidate| *candidate == letter.to_ascii_lowercase())? as u8;
    if n == 0 || l >= n {
        return None;
    }
    Some((n, l))
}

const fn index_for_atomic_number(atomic_number: usize) -> Option<usize> {
    if atomic_number == 0 || atomic_number > MAX_ATOMIC_NUMBER {
        None
    } else {
        Some(atomic_number - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        FILLING_ORDER, atomic_number_for_symbol, element_symbol, ionization_energies,
        parse_subshell_label, subshell_capacity, subshell_label, tabulated_atomic_numbers,
    };

    #[test]
    fn symbol_lookup_round_trips_through_atomic_number() {
        assert_eq!(element_symbol(13), Some("Al"));
        assert_eq!(element_symbol(0), None);
        assert_eq!(element_symbol(101), None);
        assert_eq!(atomic_number_for_symbol(" ge "), Some(32));
        assert_eq!(atomic_number_for_symbol(""), None);
    }

    #[test]
    fn ionization_tables_have_one_entry_per_stage() {
        for &atomic_number in tabulated_atomic_numbers() {
            let energies = ionization_energies(atomic_number).expect("tabulated element");
            assert_eq!(energies.len(), atomic_number);
            assert!(energies.iter().all(|energy| *energy > 0.0));
        }
        assert!(ionization_energies(26).is_none());
    }

    #[test]
    fn filling_order_covers_118_electrons() {
        let total: u32 = FILLING_ORDER.iter().map(|(_, l)| subshell_capacity(*l)).sum();
        assert_eq!(total, 118);
    }

    #[test]
    fn subshell_labels_parse_back() {
        assert_eq!(subshell_label(4, 3).as_deref(), Some("4f"));
        assert_eq!(parse_subshell_label("4f"), Some((4, 3)));
        assert_eq!(parse_subshell_label("2d"), None);
        assert_eq!(parse_subshell_label("x"), None);
    }
}
