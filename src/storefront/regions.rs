//! Static division → district → upazila lookup for Bangladeshi shipping
//! addresses, plus the cascading selection the checkout form uses.

pub const DIVISIONS: [&str; 8] = [
    "Dhaka",
    "Chittagong",
    "Khulna",
    "Rajshahi",
    "Sylhet",
    "Barishal",
    "Rangpur",
    "Mymensingh",
];

pub fn districts_of(division: &str) -> &'static [&'static str] {
    match division {
        "Dhaka" => &["Gazipur", "Narayanganj", "Tangail", "Kishoreganj", "Manikganj"],
        "Chittagong" => &["Cox's Bazar", "Bandarban", "Rangamati", "Khagrachhari", "Feni"],
        "Khulna" => &["Satkhira", "Jessore", "Narail", "Bagerhat", "Chuadanga"],
        "Rajshahi" => &["Bogra", "Joypurhat", "Naogaon", "Natore", "Pabna"],
        "Sylhet" => &["Habiganj", "Moulvibazar", "Sunamganj", "Sylhet Sadar"],
        "Barishal" => &["Barguna", "Barishal Sadar", "Bhola", "Jhalokati", "Patuakhali"],
        "Rangpur" => &["Dinajpur", "Gaibandha", "Kurigram", "Lalmonirhat", "Nilphamari"],
        "Mymensingh" => &["Jamalpur", "Netrokona", "Sherpur", "Mymensingh Sadar"],
        _ => &[],
    }
}

/// Only some districts have upazila data; the rest yield an empty list.
pub fn upazilas_of(district: &str) -> &'static [&'static str] {
    match district {
        "Gazipur" => &["Gazipur Sadar", "Kaliakair", "Kapasia", "Sreepur"],
        "Cox's Bazar" => &["Cox's Bazar Sadar", "Chakaria", "Kutubdia", "Teknaf"],
        "Satkhira" => &["Satkhira Sadar", "Assasuni", "Debhata", "Kalaroa"],
        "Bogra" => &["Bogra Sadar", "Adamdighi", "Dhunat", "Gabtali"],
        "Habiganj" => &["Habiganj Sadar", "Baniachong", "Chunarughat", "Madhabpur"],
        "Barguna" => &["Barguna Sadar", "Amtali", "Betagi", "Bamna"],
        "Dinajpur" => &["Dinajpur Sadar", "Birampur", "Birganj", "Chirirbandar"],
        "Jamalpur" => &["Jamalpur Sadar", "Dewanganj", "Islampur", "Melandaha"],
        _ => &[],
    }
}

pub fn is_division(division: &str) -> bool {
    DIVISIONS.contains(&division)
}

/// The three linked dropdowns of the shipping form. Empty strings mean
/// "nothing selected".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionSelection {
    division: String,
    district: String,
    upazila: String,
}

impl RegionSelection {
    /// Restores a saved address, dropping the parts that do not fit together.
    pub fn new(division: &str, district: &str, upazila: &str) -> Self {
        let mut selection = Self::default();
        selection.select_division(division);
        selection.select_district(district);
        selection.select_upazila(upazila);
        selection
    }

    pub fn division(&self) -> &str {
        &self.division
    }

    pub fn district(&self) -> &str {
        &self.district
    }

    pub fn upazila(&self) -> &str {
        &self.upazila
    }

    pub fn district_options(&self) -> &'static [&'static str] {
        districts_of(&self.division)
    }

    pub fn upazila_options(&self) -> &'static [&'static str] {
        upazilas_of(&self.district)
    }

    pub fn select_division(&mut self, division: &str) {
        self.division = division.to_string();
        if !self.district_options().contains(&self.district.as_str()) {
            self.district.clear();
        }
        self.prune_upazila();
    }

    /// Ignored unless `district` belongs to the current division.
    pub fn select_district(&mut self, district: &str) {
        if district.is_empty() || self.district_options().contains(&district) {
            self.district = district.to_string();
            self.prune_upazila();
        }
    }

    /// Ignored unless `upazila` belongs to the current district.
    pub fn select_upazila(&mut self, upazila: &str) {
        if upazila.is_empty() || self.upazila_options().contains(&upazila) {
            self.upazila = upazila.to_string();
        }
    }

    fn prune_upazila(&mut self) {
        if !self.upazila_options().contains(&self.upazila.as_str()) {
            self.upazila.clear();
        }
    }
}
