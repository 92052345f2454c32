// Flat layout of the normalized result store read by `NormalizedStore`.

diesel::table! {
    consolidated_unknown_compounds (id) {
        id -> BigInt,
        molecular_weight -> Double,
        retention_time -> Double,
        max_area -> Double,
        peak_rating_max -> Double,
        background_status -> Integer,
        excluded_by -> Integer,
        ms_depth -> Integer,
        checked -> Bool,
        polarity -> Integer,
    }
}

diesel::table! {
    best_hit_ion_instances (id) {
        id -> BigInt,
        compound_id -> BigInt,
        best_hit_type -> Integer,
        ion_description -> Text,
        mass -> Double,
        charge -> Integer,
    }
}

diesel::table! {
    mass_spectrum_infos (id) {
        id -> BigInt,
        best_hit_id -> BigInt,
        ms_order -> Integer,
        mass_analyzer -> Integer,
        scan_number -> Integer,
        activation_energy -> Nullable<Double>,
    }
}

diesel::table! {
    mass_spectrum_centroids (spectrum_id, mz) {
        spectrum_id -> BigInt,
        mz -> Double,
        intensity -> Double,
    }
}

diesel::table! {
    unknown_compound_instances (id) {
        id -> BigInt,
        compound_id -> BigInt,
        fwhm -> Nullable<Double>,
    }
}

diesel::joinable!(best_hit_ion_instances -> consolidated_unknown_compounds (compound_id));
diesel::joinable!(mass_spectrum_infos -> best_hit_ion_instances (best_hit_id));
diesel::joinable!(mass_spectrum_centroids -> mass_spectrum_infos (spectrum_id));
diesel::joinable!(unknown_compound_instances -> consolidated_unknown_compounds (compound_id));

diesel::allow_tables_to_appear_in_same_query!(
    best_hit_ion_instances,
    consolidated_unknown_compounds,
    mass_spectrum_centroids,
    mass_spectrum_infos,
    unknown_compound_instances,
);
