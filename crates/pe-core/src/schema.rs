// @generated by hand to match migrations/ — not Diesel CLI output, since this
// workspace has no running database to introspect against.

diesel::table! {
    pe_firms (id) {
        id -> Int4,
        name -> Text,
        cik -> Nullable<Text>,
        crd_number -> Nullable<Text>,
        website -> Nullable<Text>,
        firm_type -> Nullable<Text>,
        aum_usd -> Nullable<Numeric>,
        employee_count -> Nullable<Int4>,
        sic_code -> Nullable<Text>,
        headquarters_city -> Nullable<Text>,
        headquarters_state -> Nullable<Text>,
        headquarters_country -> Nullable<Text>,
        linkedin_url -> Nullable<Text>,
        twitter_url -> Nullable<Text>,
        contact_email -> Nullable<Text>,
        is_sec_registered -> Bool,
        status -> Text,
        confidence -> Nullable<Text>,
        data_sources -> Nullable<Array<Text>>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    pe_funds (id) {
        id -> Int4,
        firm_id -> Int4,
        name -> Text,
        strategy -> Nullable<Text>,
        vintage_year -> Nullable<Int4>,
        fund_size_usd -> Nullable<Numeric>,
        status -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    pe_fund_performance (id) {
        id -> Int4,
        fund_id -> Int4,
        as_of_date -> Date,
        net_irr_pct -> Nullable<Numeric>,
        gross_irr_pct -> Nullable<Numeric>,
        moic -> Nullable<Numeric>,
        dpi -> Nullable<Numeric>,
        rvpi -> Nullable<Numeric>,
        tvpi -> Nullable<Numeric>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    pe_portfolio_companies (id) {
        id -> Int4,
        name -> Text,
        industry -> Nullable<Text>,
        sector -> Nullable<Text>,
        description -> Nullable<Text>,
        employee_count -> Nullable<Int4>,
        headquarters_city -> Nullable<Text>,
        headquarters_state -> Nullable<Text>,
        headquarters_country -> Nullable<Text>,
        website -> Nullable<Text>,
        ticker -> Nullable<Text>,
        ownership_status -> Nullable<Text>,
        current_pe_owner -> Nullable<Text>,
        status -> Text,
        confidence -> Nullable<Text>,
        data_sources -> Nullable<Array<Text>>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    pe_people (id) {
        id -> Int4,
        full_name -> Text,
        linkedin_url -> Nullable<Text>,
        current_title -> Nullable<Text>,
        current_company -> Nullable<Text>,
        bio -> Nullable<Text>,
        confidence -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    pe_person_education (id) {
        id -> Int4,
        person_id -> Int4,
        institution -> Text,
        degree -> Nullable<Text>,
        field_of_study -> Nullable<Text>,
        graduation_year -> Nullable<Int4>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    pe_person_experience (id) {
        id -> Int4,
        person_id -> Int4,
        company -> Text,
        title -> Text,
        start_year -> Nullable<Int4>,
        end_year -> Nullable<Int4>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    pe_firm_people (id) {
        id -> Int4,
        firm_id -> Int4,
        person_id -> Int4,
        title -> Nullable<Text>,
        is_current -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    pe_company_leadership (id) {
        id -> Int4,
        company_id -> Int4,
        person_id -> Int4,
        title -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    pe_competitor_mappings (id) {
        id -> Int4,
        company_id -> Int4,
        competitor_company_id -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    pe_fund_investments (id) {
        id -> Int4,
        fund_id -> Int4,
        company_id -> Int4,
        investment_date -> Nullable<Date>,
        investment_type -> Text,
        invested_amount_usd -> Nullable<Numeric>,
        status -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    pe_deals (id) {
        id -> Int4,
        company_id -> Nullable<Int4>,
        deal_type -> Nullable<Text>,
        deal_sub_type -> Nullable<Text>,
        deal_name -> Nullable<Text>,
        announced_date -> Nullable<Date>,
        closed_date -> Nullable<Date>,
        enterprise_value_usd -> Nullable<Numeric>,
        buyer_name -> Nullable<Text>,
        seller_name -> Nullable<Text>,
        status -> Text,
        data_source -> Nullable<Text>,
        source_url -> Nullable<Text>,
        press_release_url -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    pe_deal_participants (id) {
        id -> Int4,
        deal_id -> Int4,
        firm_id -> Nullable<Int4>,
        participant_name -> Text,
        participant_type -> Nullable<Text>,
        role -> Nullable<Text>,
        is_lead -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    pe_deal_advisors (id) {
        id -> Int4,
        deal_id -> Int4,
        firm_id -> Nullable<Int4>,
        advisor_name -> Text,
        advisor_type -> Nullable<Text>,
        role -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    pe_deal_person_involvement (id) {
        id -> Int4,
        deal_id -> Int4,
        person_id -> Int4,
        role -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    pe_company_financials (id) {
        id -> Int4,
        company_id -> Int4,
        fiscal_year -> Int4,
        fiscal_period -> Text,
        revenue_usd -> Nullable<Numeric>,
        ebitda_usd -> Nullable<Numeric>,
        gross_profit_usd -> Nullable<Numeric>,
        ebit_usd -> Nullable<Numeric>,
        net_income_usd -> Nullable<Numeric>,
        total_assets_usd -> Nullable<Numeric>,
        total_debt_usd -> Nullable<Numeric>,
        cash_usd -> Nullable<Numeric>,
        shareholders_equity_usd -> Nullable<Numeric>,
        free_cash_flow_usd -> Nullable<Numeric>,
        operating_cash_flow_usd -> Nullable<Numeric>,
        gross_margin_pct -> Nullable<Numeric>,
        ebitda_margin_pct -> Nullable<Numeric>,
        revenue_growth_pct -> Nullable<Numeric>,
        data_source -> Nullable<Text>,
        confidence -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    pe_company_valuations (id) {
        id -> Int4,
        company_id -> Int4,
        valuation_date -> Date,
        enterprise_value_usd -> Nullable<Numeric>,
        equity_value_usd -> Nullable<Numeric>,
        ev_revenue_multiple -> Nullable<Numeric>,
        ev_ebitda_multiple -> Nullable<Numeric>,
        price_earnings_multiple -> Nullable<Numeric>,
        valuation_type -> Nullable<Text>,
        methodology -> Nullable<Text>,
        data_source -> Text,
        source_url -> Nullable<Text>,
        confidence -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    pe_firm_news (id) {
        id -> Int4,
        firm_id -> Int4,
        title -> Text,
        source_name -> Nullable<Text>,
        source_url -> Text,
        summary -> Nullable<Text>,
        published_date -> Nullable<Timestamptz>,
        news_type -> Nullable<Text>,
        sentiment -> Nullable<Text>,
        sentiment_score -> Nullable<Numeric>,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(pe_funds -> pe_firms (firm_id));
diesel::joinable!(pe_fund_performance -> pe_funds (fund_id));
diesel::joinable!(pe_fund_investments -> pe_funds (fund_id));
diesel::joinable!(pe_fund_investments -> pe_portfolio_companies (company_id));
diesel::joinable!(pe_person_education -> pe_people (person_id));
diesel::joinable!(pe_person_experience -> pe_people (person_id));
diesel::joinable!(pe_firm_people -> pe_firms (firm_id));
diesel::joinable!(pe_firm_people -> pe_people (person_id));
diesel::joinable!(pe_company_leadership -> pe_portfolio_companies (company_id));
diesel::joinable!(pe_company_leadership -> pe_people (person_id));
diesel::joinable!(pe_deal_participants -> pe_deals (deal_id));
diesel::joinable!(pe_deal_advisors -> pe_deals (deal_id));
diesel::joinable!(pe_deal_person_involvement -> pe_deals (deal_id));
diesel::joinable!(pe_deal_person_involvement -> pe_people (person_id));
diesel::joinable!(pe_company_financials -> pe_portfolio_companies (company_id));
diesel::joinable!(pe_company_valuations -> pe_portfolio_companies (company_id));
diesel::joinable!(pe_firm_news -> pe_firms (firm_id));
diesel::joinable!(pe_deals -> pe_portfolio_companies (company_id));

diesel::allow_tables_to_appear_in_same_query!(
    pe_firms,
    pe_funds,
    pe_fund_performance,
    pe_portfolio_companies,
    pe_people,
    pe_person_education,
    pe_person_experience,
    pe_firm_people,
    pe_company_leadership,
    pe_competitor_mappings,
    pe_fund_investments,
    pe_deals,
    pe_deal_participants,
    pe_deal_advisors,
    pe_deal_person_involvement,
    pe_company_financials,
    pe_company_valuations,
    pe_firm_news,
);
